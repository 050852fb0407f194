//! Input records and the text sanitization applied before prompting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Marker inserted between the kept head and tail of a truncated body.
pub const ELISION_MARKER: &str = " [...] ";

const RE_BIDI_ZW_STR: &str = r"[\x{200B}-\x{200F}\x{2066}-\x{2069}\x{FEFF}]";
const RE_WHITESPACE_STR: &str = r"\s+";
const RE_TAG_STR: &str = r"<[^>]+>";
const RE_URL_STR: &str = r"https?://\S+";
const RE_EMAIL_ADDR_STR: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const RE_QUOTED_LINE_STR: &str = r"(?m)^>.*$";
// Pasted attachments and signature blocks show up as long base64 runs
const RE_BASE64_RUN_STR: &str = r"[A-Za-z0-9+/]{50,}={0,2}";

lazy_static::lazy_static!(
    static ref RE_BIDI_ZW: Regex = Regex::new(RE_BIDI_ZW_STR).unwrap();
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_TAG: Regex = Regex::new(RE_TAG_STR).unwrap();
    static ref RE_URL: Regex = Regex::new(RE_URL_STR).unwrap();
    static ref RE_EMAIL_ADDR: Regex = Regex::new(RE_EMAIL_ADDR_STR).unwrap();
    static ref RE_QUOTED_LINE: Regex = Regex::new(RE_QUOTED_LINE_STR).unwrap();
    static ref RE_BASE64_RUN: Regex = Regex::new(RE_BASE64_RUN_STR).unwrap();
);

/// One email as supplied by the caller. Field order in the input list defines
/// processing order and output correspondence.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
}

/// An [`EmailRecord`] scrubbed down to what the model should see.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SanitizedEmail {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

impl SanitizedEmail {
    /// Normalize every field, strip body noise, and bound the body to
    /// `body_keep_chars` characters from each end.
    pub fn from_record(record: &EmailRecord, body_keep_chars: usize) -> Self {
        let subject = clean_invisibles(&record.subject);
        let sender = clean_invisibles(&record.sender);
        let body = clean_invisibles(&record.body);
        let body = strip_body_noise(&body);
        let body = keep_start_end(&body, body_keep_chars);

        SanitizedEmail {
            subject: if subject.is_empty() {
                "No Subject".to_string()
            } else {
                subject
            },
            sender: if sender.is_empty() {
                "Unknown".to_string()
            } else {
                sender
            },
            body,
        }
    }
}

/// Normalize unicode tricks out of text: NFKC composition, space-variant
/// folding, zero-width/bidi control removal, whitespace collapse. Runs before
/// any structural stripping so invisible characters cannot split the patterns
/// those strippers look for.
pub fn clean_invisibles(text: &str) -> String {
    let composed: String = text
        .nfkc()
        .map(|c| match c {
            '\u{00A0}' | '\u{202F}' | '\u{2007}' => ' ',
            c => c,
        })
        .collect();
    let stripped = RE_BIDI_ZW.replace_all(&composed, "");
    let collapsed = RE_WHITESPACE.replace_all(&stripped, " ");

    collapsed.trim().to_string()
}

/// Remove markup, hyperlinks, addresses, quoted reply lines, and base64 blobs
/// from an already normalized body. These inflate token count without adding
/// classification signal.
pub fn strip_body_noise(body: &str) -> String {
    let b = RE_TAG.replace_all(body, " ");
    let b = RE_URL.replace_all(&b, " ");
    let b = RE_EMAIL_ADDR.replace_all(&b, " ");
    let b = RE_QUOTED_LINE.replace_all(&b, "");
    let b = RE_BASE64_RUN.replace_all(&b, " ");
    let b = RE_WHITESPACE.replace_all(&b, " ");

    b.trim().to_string()
}

/// Bound long text by keeping `limit` characters from each end around an
/// elision marker. The two ends of a job-application email typically carry
/// the status-determining language. Lengths are characters, not bytes.
pub fn keep_start_end(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= 2 * limit {
        return text.to_string();
    }

    let head: String = text.chars().take(limit).collect();
    let tail: String = text.chars().skip(total - limit).collect();

    format!("{head}{ELISION_MARKER}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_invisibles_removes_hidden_characters() {
        let text = "Job\u{200B} Offer\u{200E}\u{FEFF} inside\u{2066}!\u{2069}";
        let result = clean_invisibles(text);
        assert_eq!(result, "Job Offer inside!");
    }

    #[test]
    fn test_clean_invisibles_folds_space_variants() {
        let text = "Senior\u{00A0}Engineer\u{202F}at\u{2007}Acme";
        let result = clean_invisibles(text);
        assert_eq!(result, "Senior Engineer at Acme");
    }

    #[test]
    fn test_clean_invisibles_applies_nfkc() {
        // U+FB01 is the "fi" ligature, U+FF28 a fullwidth H
        let text = "\u{FB01}nal round with \u{FF28}R";
        let result = clean_invisibles(text);
        assert_eq!(result, "final round with HR");
    }

    #[test]
    fn test_clean_invisibles_collapses_whitespace() {
        let text = "  We are\npleased\t\tto   offer\r\n you ";
        let result = clean_invisibles(text);
        assert_eq!(result, "We are pleased to offer you");
    }

    #[test]
    fn test_clean_invisibles_is_idempotent() {
        let samples = [
            "plain text",
            "Job\u{200B} Offer\u{00A0}now",
            "  spaced \t out  ",
            "\u{FB01}xed\u{FEFF} point",
            "",
        ];

        for sample in samples {
            let once = clean_invisibles(sample);
            let twice = clean_invisibles(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_strip_body_noise_removes_tags() {
        let body = "<div>We would <b>love</b> to interview you</div>";
        let result = strip_body_noise(body);
        assert_eq!(result, "We would love to interview you");
    }

    #[test]
    fn test_strip_body_noise_removes_urls() {
        let body = "Schedule here https://calendly.com/acme/30min before Friday";
        let result = strip_body_noise(body);
        assert_eq!(result, "Schedule here before Friday");
    }

    #[test]
    fn test_strip_body_noise_removes_addresses() {
        let body = "Reply to recruiting@acme-corp.io with your availability";
        let result = strip_body_noise(body);
        assert_eq!(result, "Reply to with your availability");
    }

    #[test]
    fn test_strip_body_noise_removes_quoted_lines() {
        let body = "Sounds good!\n> On Tuesday you wrote:\n> see attached\nThanks";
        let result = strip_body_noise(body);
        assert_eq!(result, "Sounds good! Thanks");
    }

    #[test]
    fn test_strip_body_noise_removes_base64_runs() {
        let blob = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqa2xtbm9w==";
        let body = format!("Resume attached {blob} regards");
        let result = strip_body_noise(&body);
        assert_eq!(result, "Resume attached regards");
    }

    #[test]
    fn test_strip_body_noise_keeps_short_base64_lookalikes() {
        // Under 50 characters, so it stays
        let body = "Your code is QUJDREVGRw";
        let result = strip_body_noise(body);
        assert_eq!(result, "Your code is QUJDREVGRw");
    }

    #[test]
    fn test_keep_start_end_short_text_unchanged() {
        let text = "short body";
        assert_eq!(keep_start_end(text, 800), "short body");

        // Exactly at the bound stays intact
        let text = "a".repeat(1600);
        assert_eq!(keep_start_end(&text, 800), text);
    }

    #[test]
    fn test_keep_start_end_truncates_long_text() {
        let text = format!("{}{}{}", "h".repeat(800), "m".repeat(500), "t".repeat(800));
        let result = keep_start_end(&text, 800);

        assert_eq!(result.chars().count(), 2 * 800 + ELISION_MARKER.len());
        assert!(result.starts_with(&"h".repeat(800)));
        assert!(result.ends_with(&"t".repeat(800)));
        assert!(result.contains(ELISION_MARKER));
    }

    #[test]
    fn test_keep_start_end_is_character_based() {
        let text = "é".repeat(2000);
        let result = keep_start_end(&text, 800);

        assert_eq!(result.chars().count(), 2 * 800 + ELISION_MARKER.len());
        assert!(result.starts_with(&"é".repeat(800)));
        assert!(result.ends_with(&"é".repeat(800)));
    }

    #[test]
    fn test_sanitized_email_placeholders() {
        let record = EmailRecord {
            subject: " \u{200B} ".to_string(),
            sender: String::new(),
            body: "hello".to_string(),
        };
        let email = SanitizedEmail::from_record(&record, 800);

        assert_eq!(email.subject, "No Subject");
        assert_eq!(email.sender, "Unknown");
        assert_eq!(email.body, "hello");
    }

    #[test]
    fn test_sanitized_email_full_pipeline() {
        let record = EmailRecord {
            subject: "Offer\u{00A0}Letter".to_string(),
            sender: "HR Team".to_string(),
            body: "<p>Congratulations!</p> Details at https://acme.io/offer \
                   or email hr@acme.io"
                .to_string(),
        };
        let email = SanitizedEmail::from_record(&record, 800);

        assert_eq!(email.subject, "Offer Letter");
        assert_eq!(email.sender, "HR Team");
        assert_eq!(email.body, "Congratulations! Details at or email");
    }

    #[test]
    fn test_email_record_deserializes_with_missing_fields() {
        let record: EmailRecord = serde_json::from_str(r#"{"subject": "Hi"}"#).unwrap();

        assert_eq!(record.subject, "Hi");
        assert_eq!(record.sender, "");
        assert_eq!(record.body, "");
    }
}
