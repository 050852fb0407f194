//! Repair and decoding of model replies.
//!
//! Even with JSON mode forced, local models wrap their output in markdown
//! fences, stringify the array into an object key, or bury it in prose. The
//! extractors below are tried in order; later ones are strictly more
//! permissive, so the first structural hit wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// One classification record, positionally aligned with the batch that
/// produced it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_job: bool,
    pub company: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

type SpanExtractor = fn(&str) -> Option<&str>;

const SPAN_EXTRACTORS: &[SpanExtractor] = &[
    stringified_key_span,
    single_quoted_wrapper_span,
    clean_array_span,
    widest_array_span,
];

/// Decode a raw model reply into at most `expected` records.
///
/// Count mismatches are logged, not failed: extra entries are dropped and
/// missing ones are never fabricated. Entries that are not key-value records
/// are skipped. A reply with no usable records at all is an error so the
/// caller can retry at a smaller batch size.
pub fn parse_results(raw: &str, expected: usize) -> Result<Vec<ClassificationResult>, ParseError> {
    let trimmed = raw.trim();
    let payload = extract_payload(strip_code_fence(trimmed));

    let value: Value = serde_json::from_str(payload)?;
    let entries = match value {
        Value::Array(entries) => entries,
        // A one-email batch sometimes comes back as a bare object
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ParseError::UnexpectedShape {
                got: json_type_name(&other),
            })
        }
    };

    if entries.len() != expected {
        tracing::warn!(
            expected,
            got = entries.len(),
            "model returned a different number of records than emails sent"
        );
    }

    let results: Vec<ClassificationResult> =
        entries.iter().take(expected).filter_map(decode_entry).collect();

    if results.is_empty() {
        return Err(ParseError::NoRecords);
    }

    Ok(results)
}

/// Decode one array entry. `is_job` falls back to false when absent or not a
/// boolean; the remaining fields stay null unless the model sent a string.
fn decode_entry(entry: &Value) -> Option<ClassificationResult> {
    let record = entry.as_object()?;

    Some(ClassificationResult {
        is_job: record
            .get("is_job")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        company: string_field(record, "company"),
        role: string_field(record, "role"),
        status: string_field(record, "status"),
    })
}

fn string_field(record: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn extract_payload(reply: &str) -> &str {
    for extract in SPAN_EXTRACTORS {
        if let Some(span) = extract(reply) {
            return span;
        }
    }
    reply
}

// Markdown fences: drop the backticks and an optional language tag line,
// then let the span extractors work on what is left.
fn strip_code_fence(reply: &str) -> &str {
    if !reply.starts_with("```") {
        return reply;
    }

    let inner = reply.trim_matches('`');
    match inner.split_once('\n') {
        Some((_tag, rest)) => rest.trim(),
        None => inner.trim(),
    }
}

// The model stringified the whole array into a JSON object key, e.g.
// {"[{...}]": ""}. Take the bracketed span inside that key.
fn stringified_key_span(reply: &str) -> Option<&str> {
    if !(reply.starts_with("{\"[") && reply.contains("\"]")) {
        return None;
    }

    let start = reply.find('[')?;
    let end = reply.find("\"]")? + 1;
    if end <= start {
        return None;
    }

    Some(&reply[start..=end])
}

// A dict-literal wrapper with single-quoted keys holding an embedded JSON
// object, e.g. {'{"is_job": true}': ''}. Take the inner brace span.
fn single_quoted_wrapper_span(reply: &str) -> Option<&str> {
    if !(reply.starts_with("{'") && reply.contains("'{") && reply.contains("}':")) {
        return None;
    }

    let start = reply.find("'{")? + 1;
    let end = reply.rfind("}'")? + 1;
    if end <= start {
        return None;
    }

    Some(&reply[start..end])
}

fn clean_array_span(reply: &str) -> Option<&str> {
    if reply.starts_with('[') && reply.ends_with(']') {
        Some(reply)
    } else {
        None
    }
}

// Last resort: widest [ ... ] span anywhere in the text.
fn widest_array_span(reply: &str) -> Option<&str> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }

    Some(&reply[start..=end])
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
