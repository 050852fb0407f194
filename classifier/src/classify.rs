//! Batch orchestration over the inference client.
//!
//! Emails are classified strictly in order through a single cursor. Batches
//! that blow the token budget or fail to produce records shrink by halving;
//! a failure that persists at batch size 1 aborts the whole run and discards
//! everything classified so far.

use serde_json::json;

use crate::config::ClassifierConfig;
use crate::debug::DebugSink;
use crate::email::EmailRecord;
use crate::error::{BatchError, ClassifierError, ClassifierResult};
use crate::ollama::OllamaClient;
use crate::parse::{parse_results, ClassificationResult};
use crate::prompt::{approx_tokens, build_batch_prompt};

/// Prompts persisted to the debug channel are capped at this many chars.
const DEBUG_PROMPT_CAP: usize = 20_000;

/// Sequential email classifier over one inference service.
pub struct Classifier {
    client: OllamaClient,
    debug: DebugSink,
    initial_batch_size: usize,
    token_budget: usize,
    body_keep_chars: usize,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> ClassifierResult<Self> {
        let client = OllamaClient::new(&config)?;
        Ok(Self::with_client(client, &config))
    }

    /// Wire up an externally built client, e.g. one pointed at a stub server.
    pub fn with_client(client: OllamaClient, config: &ClassifierConfig) -> Self {
        Self {
            client,
            debug: DebugSink::new(config.debug_dir.clone()),
            initial_batch_size: config.initial_batch_size,
            token_budget: config.token_budget,
            body_keep_chars: config.body_keep_chars,
        }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Classify `emails` in input order.
    ///
    /// On success the results are positionally aligned with the input,
    /// except that single emails whose prompt alone exceeds the token budget
    /// are skipped without a record. Callers correlating by position must
    /// check lengths rather than assume 1:1.
    pub async fn classify(
        &self,
        emails: &[EmailRecord],
    ) -> ClassifierResult<Vec<ClassificationResult>> {
        if !self.client.is_running().await {
            tracing::error!(base_url = %self.client.base_url(), "inference service is not reachable");
            return Err(ClassifierError::Unavailable(
                self.client.base_url().to_string(),
            ));
        }

        self.debug.record("raw_emails", &emails);

        if let Err(err) = self.client.warm_up().await {
            tracing::warn!(error = %err, "warmup failed, continuing with a cold model");
        }

        tracing::info!(total = emails.len(), "starting classification run");

        let mut state = BatchState::new(self.initial_batch_size);
        let mut attempt = 0usize;

        while state.cursor < emails.len() {
            attempt += 1;
            let batch = &emails[state.next_range(emails.len())];
            let prompt = build_batch_prompt(batch, self.body_keep_chars);
            let tokens = approx_tokens(&prompt);

            if tokens > self.token_budget {
                tracing::warn!(
                    tokens,
                    budget = self.token_budget,
                    batch_size = state.batch_size,
                    "prompt exceeds token budget"
                );
                if state.batch_size == 1 {
                    tracing::error!(index = state.cursor, "email unclassifiable within budget, skipping");
                    state.skip_one();
                } else {
                    state.shrink();
                    tracing::info!(batch_size = state.batch_size, "retrying same range");
                }
                continue;
            }

            tracing::info!(batch_size = state.batch_size, tokens, "sending batch");
            self.debug.record(
                &format!("batch_{attempt}_prompt"),
                &json!({
                    "batch_start_index": state.cursor,
                    "batch_size": state.batch_size,
                    "prompt_length": prompt.chars().count(),
                    "token_est": tokens,
                    "prompt": truncate_chars(&prompt, DEBUG_PROMPT_CAP),
                }),
            );

            match self.run_batch(&prompt, batch.len(), attempt).await {
                Ok(results) => {
                    tracing::info!(classified = results.len(), "batch classified");
                    state.advance(results);
                }
                Err(err) => {
                    tracing::error!(batch_size = state.batch_size, error = %err, "batch failed");
                    if state.batch_size == 1 {
                        return Err(ClassifierError::Aborted {
                            index: state.cursor,
                            source: err,
                        });
                    }
                    state.shrink();
                    tracing::info!(batch_size = state.batch_size, "retrying same range");
                }
            }
        }

        tracing::info!(
            classified = state.results.len(),
            total = emails.len(),
            "classification run complete"
        );
        Ok(state.results)
    }

    async fn run_batch(
        &self,
        prompt: &str,
        expected: usize,
        attempt: usize,
    ) -> Result<Vec<ClassificationResult>, BatchError> {
        let reply = self.client.complete(prompt).await?;

        self.debug.record(
            &format!("batch_{attempt}_response"),
            &json!({ "raw_response": reply }),
        );

        Ok(parse_results(&reply, expected)?)
    }
}

// ========================= Batch state =========================

/// Cursor, current batch size, and the results accumulated so far. Owned by
/// a single `classify` call; nothing here outlives the run.
struct BatchState {
    cursor: usize,
    batch_size: usize,
    results: Vec<ClassificationResult>,
}

impl BatchState {
    fn new(initial_batch_size: usize) -> Self {
        Self {
            cursor: 0,
            batch_size: initial_batch_size.max(1),
            results: Vec::new(),
        }
    }

    fn next_range(&self, total: usize) -> std::ops::Range<usize> {
        self.cursor..(self.cursor + self.batch_size).min(total)
    }

    fn shrink(&mut self) {
        self.batch_size = (self.batch_size / 2).max(1);
    }

    /// Give up on the email under the cursor without recording a result.
    fn skip_one(&mut self) {
        self.cursor += 1;
    }

    fn advance(&mut self, results: Vec<ClassificationResult>) {
        self.cursor += self.batch_size;
        self.results.extend(results);
    }
}

fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
