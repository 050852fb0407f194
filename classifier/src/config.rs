use std::path::PathBuf;

use config::{Config, ConfigError};
use serde::Deserialize;
use url::Url;

/// Knobs for one classification pipeline instance.
///
/// Every field is optional in the TOML file; anything missing falls back to
/// the defaults below, which match a stock local Ollama install.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Model tag as known to the inference service.
    pub model: String,
    /// Root URL of the Ollama-compatible service.
    pub base_url: Url,
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: i32,
    pub num_thread: u32,
    /// Keep-alive hint sent with every call so the model stays resident.
    pub keep_alive: String,
    pub connect_timeout_secs: u64,
    /// Generation is CPU-bound and slow; this bounds the wait for a reply.
    pub read_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub warmup_timeout_secs: u64,
    /// Starting batch size. A run only ever shrinks it.
    pub initial_batch_size: usize,
    /// Approximate prompt-token ceiling per call.
    pub token_budget: usize,
    /// Characters kept from each end of a long email body.
    pub body_keep_chars: usize,
    /// Directory for debug artifacts. `None` disables the channel.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            model: "mistral:7b-instruct-q4_K_M".to_string(),
            base_url: Url::parse("http://localhost:11434").unwrap(),
            temperature: 0.1,
            num_ctx: 4096,
            num_predict: 32,
            num_thread: 12,
            keep_alive: "2h".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 600,
            probe_timeout_secs: 5,
            warmup_timeout_secs: 180,
            initial_batch_size: 1,
            token_budget: 3000,
            body_keep_chars: 800,
            debug_dir: None,
        }
    }
}

impl ClassifierConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        builder.try_deserialize()
    }
}
