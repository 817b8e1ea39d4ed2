//! Text generation backends.
//!
//! [`OpenAiBackend`] calls an OpenAI-compatible `/chat/completions` endpoint with a fixed system
//! instruction, bounded output and a fixed temperature.

use async_openai::types::chat::CreateChatCompletionResponse;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::GenerationConfig;
use crate::generation::Usage;

/// Generated text plus what the backend reported about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the configured credential
    #[error("backend authentication failed: {message}")]
    Auth { message: String },

    /// The backend answered with an error status
    #[error("backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        kind: Option<String>,
        message: String,
    },

    /// The request never produced a usable answer (connect failure, timeout, unparseable body)
    #[error("backend request failed: {message}")]
    Transport { message: String },
}

/// Something that turns a prompt into an email.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, BackendError>;
}

/// OpenAI error envelope: `{"error": {"message", "type", "code"}}`
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    // Providers send this as either a string or a number
    code: Option<serde_json::Value>,
}

/// Classify a non-success response. 401s and messages about the API key are credential problems.
fn classify_error(status: u16, body: &str) -> BackendError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok().map(|envelope| envelope.error);

    let message = parsed
        .as_ref()
        .and_then(|error| error.message.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status == 401 || message.contains("API key") {
        return BackendError::Auth { message };
    }

    let (code, kind) = match parsed {
        Some(error) => (
            error.code.map(|code| match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            error.kind,
        ),
        None => (None, None),
    };

    BackendError::Api {
        status,
        code,
        kind,
        message,
    }
}

/// Client for an OpenAI-compatible chat completions API.
pub struct OpenAiBackend {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// Build a backend from configuration. Returns `None` when no API key is configured.
    pub fn from_config(config: &GenerationConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.configured_api_key() else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.timeout).build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let endpoint = base.join("chat/completions")?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<Completion, BackendError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport { message: e.to_string() })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport { message: e.to_string() })?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Generation backend returned an error");
            return Err(classify_error(status.as_u16(), &body));
        }

        let completion: CreateChatCompletionResponse = serde_json::from_str(&body).map_err(|e| BackendError::Transport {
            message: format!("Failed to parse completion response: {e}"),
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Transport {
                message: "Completion response contained no message".to_string(),
            })?;

        let usage = completion
            .usage
            .map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: completion.model,
            usage,
        })
    }
}
