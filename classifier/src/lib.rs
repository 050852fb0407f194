//! Job-application email classification via a locally hosted small language
//! model.
//!
//! The pipeline sanitizes raw emails, batches them into prompts under an
//! approximate token budget, sends each prompt to an Ollama-compatible HTTP
//! service, and repairs the loosely formatted JSON the model returns. Failed
//! batches are retried at half size instead of after a delay; a batch of one
//! that still fails aborts the whole run.

pub mod classify;
pub mod config;
pub mod debug;
pub mod email;
pub mod error;
pub mod ollama;
pub mod parse;
pub mod prompt;

pub use classify::Classifier;
pub use config::ClassifierConfig;
pub use email::EmailRecord;
pub use error::{ClassifierError, ClassifierResult};
pub use ollama::ConnectionStatus;
pub use parse::ClassificationResult;

pub type HttpClient = reqwest::Client;
