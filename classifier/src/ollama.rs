//! Client for the local inference service's HTTP API.
//!
//! Talks to three endpoints: `/api/tags` for liveness and model listing,
//! `/api/chat` for classification calls, and `/api/generate` as the fallback
//! when chat errors out or returns nothing. Calls are strictly sequential;
//! the only state kept across calls is the one-shot warmup guard.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;

use crate::config::ClassifierConfig;
use crate::error::CallError;
use crate::HttpClient;

/// System message sent with every chat call.
const SYSTEM_PROMPT: &str = "Reply strictly with valid JSON array. Do not escape quotes or wrap in additional structures. Return ONLY the raw JSON array.";

/// Tacked onto the prompt for `/api/generate`, which has no system slot.
const GENERATE_SUFFIX: &str = "Respond with ONLY the raw JSON array. Do not escape quotes or wrap in additional structures.";

/// Sampling and scheduling knobs forwarded verbatim as the `options` field.
#[derive(Debug, Clone, Serialize)]
struct GenerationOptions {
    temperature: f32,
    num_ctx: u32,
    num_predict: i32,
    num_thread: u32,
}

/// Reachability snapshot of the inference service, for operator tooling.
#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub reachable: bool,
    pub available_models: Vec<String>,
    pub model: String,
    pub base_url: String,
}

// Missing wire fields decode as empty rather than failing: an empty
// completion has its own error downstream, and a reply without `message`
// should take that path, not a decode error.
#[derive(Debug, Default, Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for one inference service instance.
///
/// Connect timeouts live on the connection pool; read deadlines are set per
/// request, since the probe, warmup, and classification calls tolerate very
/// different latencies.
#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    model: String,
    base_url: String,
    tags_url: String,
    chat_url: String,
    generate_url: String,
    options: GenerationOptions,
    keep_alive: String,
    probe_timeout: Duration,
    warmup_timeout: Duration,
    read_timeout: Duration,
    warmed: OnceCell<()>,
}

impl OllamaClient {
    pub fn new(config: &ClassifierConfig) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self::with_http_client(http, config))
    }

    /// Build over an existing connection pool, e.g. a stub server's in tests.
    pub fn with_http_client(http: HttpClient, config: &ClassifierConfig) -> Self {
        let base_url = config.base_url.as_str().trim_end_matches('/').to_string();

        Self {
            http,
            model: config.model.clone(),
            tags_url: format!("{base_url}/api/tags"),
            chat_url: format!("{base_url}/api/chat"),
            generate_url: format!("{base_url}/api/generate"),
            base_url,
            options: GenerationOptions {
                temperature: config.temperature,
                num_ctx: config.num_ctx,
                num_predict: config.num_predict,
                num_thread: config.num_thread,
            },
            keep_alive: config.keep_alive.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            warmup_timeout: Duration::from_secs(config.warmup_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            warmed: OnceCell::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liveness probe against `/api/tags`. Never fails; transport errors and
    /// non-OK statuses both read as "not running".
    pub async fn is_running(&self) -> bool {
        let response = self
            .http
            .get(&self.tags_url)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match response {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(err) => {
                tracing::debug!(error = %err, "liveness probe failed");
                false
            }
        }
    }

    /// Names of the models the service has pulled. Errors collapse to an
    /// empty list; this feeds operator tooling, not classification.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(tags) => tags.models.into_iter().map(|tag| tag.name).collect(),
            Err(err) => {
                tracing::debug!(error = %err, "could not list model tags");
                Vec::new()
            }
        }
    }

    /// Reachability plus advertised models, against the configured model.
    pub async fn connection_status(&self) -> ConnectionStatus {
        let reachable = self.is_running().await;
        let available_models = if reachable {
            self.list_models().await
        } else {
            Vec::new()
        };

        ConnectionStatus {
            reachable,
            available_models,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
        }
    }

    /// Load the model into service memory ahead of the first real call.
    ///
    /// Runs at most once per client: only a 2xx reply marks the guard done,
    /// so a failed attempt is retried by the next run instead of being
    /// remembered as warm.
    pub async fn warm_up(&self) -> Result<(), CallError> {
        self.warmed
            .get_or_try_init(|| self.send_warmup())
            .await
            .map(|_| ())
    }

    async fn send_warmup(&self) -> Result<(), CallError> {
        tracing::info!(model = %self.model, "warming up model");

        // Minimal one-word prompt with a small context; the point is the
        // model load, not the reply.
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": "ok"}],
            "options": {
                "num_ctx": 2048,
                "temperature": 0,
                "num_thread": self.options.num_thread,
            },
            "keep_alive": self.keep_alive,
            "stream": false,
        });

        self.http
            .post(&self.chat_url)
            .json(&payload)
            .timeout(self.warmup_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| CallError::Request {
                endpoint: "/api/chat",
                source,
            })?;

        tracing::info!(model = %self.model, "model warmed up");
        Ok(())
    }

    /// One classification call: `/api/chat` first, then `/api/generate` when
    /// chat errors out or returns an empty completion.
    pub async fn complete(&self, prompt: &str) -> Result<String, CallError> {
        let started = Instant::now();

        let outcome = match self.chat(prompt).await {
            Ok(content) => Ok(content),
            Err(err) => {
                tracing::error!(error = %err, "chat call failed, falling back to generate");
                self.generate(prompt).await
            }
        };

        let elapsed_secs = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(content) => {
                tracing::info!(elapsed_secs, reply_len = content.len(), "completion received");
            }
            Err(err) => {
                tracing::error!(elapsed_secs, error = %err, "completion failed");
            }
        }

        outcome
    }

    async fn chat(&self, prompt: &str) -> Result<String, CallError> {
        let payload = json!({
            "model": self.model,
            "format": "json",
            "options": self.options,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "keep_alive": self.keep_alive,
            "stream": false,
        });

        let reply: ChatReply = self
            .post_json("/api/chat", &self.chat_url, &payload)
            .await?;

        if reply.message.content.is_empty() {
            return Err(CallError::EmptyCompletion);
        }

        Ok(reply.message.content)
    }

    async fn generate(&self, prompt: &str) -> Result<String, CallError> {
        let payload = json!({
            "model": self.model,
            "format": "json",
            "options": self.options,
            "prompt": format!("{prompt}\n\n{GENERATE_SUFFIX}"),
            "keep_alive": self.keep_alive,
            "stream": false,
        });

        let reply: GenerateReply = self
            .post_json("/api/generate", &self.generate_url, &payload)
            .await?;

        if reply.response.is_empty() {
            return Err(CallError::EmptyCompletion);
        }

        Ok(reply.response)
    }

    async fn fetch_tags(&self) -> Result<TagsReply, reqwest::Error> {
        self.http
            .get(&self.tags_url)
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<T, CallError> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .timeout(self.read_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| CallError::Request { endpoint, source })?;

        response
            .json()
            .await
            .map_err(|source| CallError::Request { endpoint, source })
    }
}
