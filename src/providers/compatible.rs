//! OpenAI-compatible `chat/completions` backend.
//!
//! Works against Groq (the default endpoint), OpenAI, and any local server
//! exposing the same wire format (Ollama's `/v1`, vLLM, llama.cpp).

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{BackendError, ChatMessage, ChatResponse, CompletionBackend};
use crate::config::BackendConfig;

/// Connect timeout applied on top of the per-request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    stream: bool,
}

/// HTTP backend speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleBackend {
    name: String,
    /// Base URL without trailing slash (e.g. `https://api.groq.com/openai/v1`).
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    /// Create a backend for `base_url`.
    pub fn new(name: &str, base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Create from a [`BackendConfig`].
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            &config.name,
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn classify_transport_error(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        BackendError::Connection(err.to_string())
    } else if err.is_decode() || err.is_body() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Connection(err.to_string())
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> Result<ChatResponse, BackendError> {
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature,
            stream: false,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }

        resp.json::<ChatResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

// ── Tests ────────────────────────────────────────────────────────
