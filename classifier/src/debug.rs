//! Best-effort persistence of raw inputs, prompts, and responses.
//!
//! Artifacts land as timestamped pretty-printed JSON under a configured
//! directory. Every failure on this path is logged and swallowed; the
//! audit channel must never change a classification outcome.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub struct DebugSink {
    dir: Option<PathBuf>,
}

impl DebugSink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Persist one artifact as `{label}_{timestamp}.json`.
    pub fn record<T: Serialize>(&self, label: &str, data: &T) {
        let Some(dir) = &self.dir else {
            return;
        };

        match write_artifact(dir, label, data) {
            Ok(path) => tracing::debug!(path = %path.display(), "debug artifact saved"),
            Err(err) => tracing::warn!(label, error = %err, "failed to write debug artifact"),
        }
    }
}

fn write_artifact<T: Serialize>(dir: &Path, label: &str, data: &T) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{label}_{stamp}.json"));
    fs::write(&path, serde_json::to_string_pretty(data)?)?;

    Ok(path)
}
