//! Prompt assembly for batch classification.

use indoc::{formatdoc, indoc};

use crate::email::{EmailRecord, SanitizedEmail};

/// Schema and rules block shared by every batch prompt. Kept out of the
/// format template so the literal braces need no escaping.
const OUTPUT_INSTRUCTIONS: &str = indoc! {r#"
    Output format:
    [
      {"is_job": true/false, "company": "name", "role": "title", "status": "applied/interview/offer/rejected"}
    ]

    Rules:
    - is_job=true: application confirmations, interviews, offers, rejections
    - is_job=false: newsletters, alerts, marketing, networking
    - Use null for unclear values"#
};

/// Render one prompt for a batch of emails. Each email is sanitized, given a
/// 1-based index label, and laid out as a fixed Subject/From/Body block; the
/// instruction template brackets the lot. No state is kept between calls.
pub fn build_batch_prompt(emails: &[EmailRecord], body_keep_chars: usize) -> String {
    let blocks = emails
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let email = SanitizedEmail::from_record(record, body_keep_chars);
            format!(
                "Email {}:\nSubject: {}\nFrom: {}\nBody: {}\n",
                i + 1,
                email.subject,
                email.sender,
                email.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    formatdoc! {r#"
        Classify these emails as job-related or not.

        {OUTPUT_INSTRUCTIONS}

        Emails to classify:

        {blocks}

        Return ONLY the JSON array starting with [ and ending with ]."#
    }
}

/// Character-count proxy for prompt tokens: `max(1, ceil(chars / 4))`.
/// Deterministic and cheap; used only for budget gating.
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}
