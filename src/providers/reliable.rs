//! Retry, backoff and fallback-model escalation around a [`CompletionBackend`].

use std::sync::Arc;
use std::time::Duration;

use super::{BackendError, ChatMessage, CompletionBackend};
use crate::config::Config;

/// Base delay of the exponential backoff (delay = 2^attempt × base).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Model selection and retry policy for a [`CompletionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub temperature: f64,
    /// Retries after the first attempt (total primary calls = retries + 1).
    pub retry_attempts: u32,
    pub backoff_base: Duration,
}

impl ModelSettings {
    /// Snapshot the model-related fields of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            primary_model: config.primary_model.clone(),
            fallback_model: config
                .fallback_model
                .clone()
                .filter(|m| !m.trim().is_empty()),
            temperature: config.temperature,
            retry_attempts: config.retry_attempts,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Backoff before retry number `attempt + 1` (attempt starts at 0).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor)
    }
}

/// A completion that failed after the retry and fallback budget was spent.
///
/// `source` is the last error of the primary model; when the fallback model
/// was tried and also failed, its error is kept in `fallback`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("chat completion with model '{model}' failed after {attempts} attempt(s): {source}{}", fallback_suffix(.fallback))]
pub struct CompletionError {
    pub model: String,
    pub attempts: u32,
    #[source]
    pub source: BackendError,
    pub fallback: Option<FallbackFailure>,
}

/// Failure of the single fallback-model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackFailure {
    pub model: String,
    pub error: BackendError,
}

fn fallback_suffix(fallback: &Option<FallbackFailure>) -> String {
    match fallback {
        Some(f) => format!(" (fallback model '{}' also failed: {})", f.model, f.error),
        None => String::new(),
    }
}

/// Issues chat completions with retry/backoff and one fallback attempt.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    settings: ModelSettings,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: ModelSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Complete `messages` and return the first choice's text.
    ///
    /// 1. Call the primary model.
    /// 2. On a transient failure, sleep 2^attempt × base and retry, up to
    ///    `retry_attempts` times.
    /// 3. When the primary path is exhausted and a fallback model is
    ///    configured, call the fallback model exactly once.
    /// 4. Non-transient failures propagate immediately.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let model = self.settings.primary_model.as_str();
        let max_attempts = self.settings.retry_attempts.saturating_add(1);
        let mut attempt: u32 = 0;

        let last_error = loop {
            tracing::debug!(
                backend = self.backend.name(),
                model,
                "Making chat completion request (attempt {}/{})",
                attempt + 1,
                max_attempts
            );

            let error = match self.call(messages, model).await {
                Ok(text) => {
                    tracing::debug!(model, attempt = attempt + 1, "Chat completion successful");
                    return Ok(text);
                }
                Err(e) => e,
            };

            tracing::warn!(model, attempt = attempt + 1, error = %error, "Chat completion error");

            if !error.is_transient() {
                return Err(CompletionError {
                    model: model.to_string(),
                    attempts: attempt + 1,
                    source: error,
                    fallback: None,
                });
            }

            if attempt >= self.settings.retry_attempts {
                break error;
            }

            let delay = self.settings.backoff_delay(attempt);
            tracing::info!(model, delay_ms = delay.as_millis() as u64, "Retrying chat completion");
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        let attempts = attempt + 1;
        let Some(fallback_model) = self.settings.fallback_model.as_deref() else {
            return Err(CompletionError {
                model: model.to_string(),
                attempts,
                source: last_error,
                fallback: None,
            });
        };

        tracing::info!(model = fallback_model, "Trying fallback model");
        match self.call(messages, fallback_model).await {
            Ok(text) => {
                tracing::info!(model = fallback_model, "Fallback model succeeded");
                Ok(text)
            }
            Err(fallback_error) => {
                tracing::error!(
                    model = fallback_model,
                    error = %fallback_error,
                    "Fallback model also failed"
                );
                Err(CompletionError {
                    model: model.to_string(),
                    attempts,
                    source: last_error,
                    fallback: Some(FallbackFailure {
                        model: fallback_model.to_string(),
                        error: fallback_error,
                    }),
                })
            }
        }
    }

    async fn call(&self, messages: &[ChatMessage], model: &str) -> Result<String, BackendError> {
        self.backend
            .chat(messages, model, self.settings.temperature)
            .await?
            .first_text()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::ChatResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Backend that replays a fixed script of replies and records every call.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ChatResponse, BackendError>>>,
        pub calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: Vec<Result<ChatResponse, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn models(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            model: &str,
            _temperature: f64,
        ) -> Result<ChatResponse, BackendError> {
            self.calls.lock().push((model.to_string(), Instant::now()));
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Request {
                    status: 418,
                    body: "script exhausted".into(),
                }))
        }
    }

    fn settings(retry_attempts: u32, fallback: Option<&str>) -> ModelSettings {
        ModelSettings {
            primary_model: "primary".into(),
            fallback_model: fallback.map(String::from),
            temperature: 0.1,
            retry_attempts,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    fn ok(text: &str) -> Result<ChatResponse, BackendError> {
        Ok(ChatResponse::from_text(text))
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("sys"), ChatMessage::user("diff")]
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let s = settings(3, None);
        assert_eq!(s.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(s.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(s.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn blank_fallback_model_is_ignored() {
        let config = Config {
            fallback_model: Some("  ".into()),
            ..Config::default()
        };
        assert!(ModelSettings::from_config(&config).fallback_model.is_none());
    }

    #[tokio::test]
    async fn first_success_makes_one_call() {
        let backend = ScriptedBackend::new(vec![ok("hello")]);
        let client = CompletionClient::new(backend.clone(), settings(3, Some("fb")));

        assert_eq!(client.complete(&messages()).await.unwrap(), "hello");
        assert_eq!(backend.models(), vec!["primary"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried_with_exponential_backoff() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::RateLimited),
            Err(BackendError::RateLimited),
            ok("third time lucky"),
        ]);
        let client = CompletionClient::new(backend.clone(), settings(3, None));

        let text = client.complete(&messages()).await.unwrap();
        assert_eq!(text, "third time lucky");

        let calls = backend.calls.lock();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1].1 - calls[0].1;
        let second_gap = calls[2].1 - calls[1].1;
        assert!(first_gap >= Duration::from_secs(1) && first_gap < Duration::from_millis(1100));
        assert!(second_gap >= Duration::from_secs(2) && second_gap < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn contract_violation_is_retried() {
        let backend = ScriptedBackend::new(vec![Ok(ChatResponse::default()), ok("fine")]);
        let client = CompletionClient::new(backend.clone(), settings(1, None));

        assert_eq!(client.complete(&messages()).await.unwrap(), "fine");
        assert_eq!(backend.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Request {
                status: 401,
                body: "invalid api key".into(),
            }),
            ok("never reached"),
        ]);
        let client = CompletionClient::new(backend.clone(), settings(3, Some("fb")));

        let err = client.complete(&messages()).await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(err.fallback.is_none());
        assert!(matches!(err.source, BackendError::Request { status: 401, .. }));
        assert_eq!(backend.models(), vec!["primary"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_without_fallback_propagate_last_error() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::RateLimited),
            Err(BackendError::Server {
                status: 503,
                body: "overloaded".into(),
            }),
        ]);
        let client = CompletionClient::new(backend.clone(), settings(1, None));

        let err = client.complete(&messages()).await.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(matches!(err.source, BackendError::Server { status: 503, .. }));
        assert_eq!(backend.calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_is_called_once_after_exhaustion() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::RateLimited),
            Err(BackendError::RateLimited),
            Err(BackendError::RateLimited),
            ok("from fallback"),
        ]);
        let client = CompletionClient::new(backend.clone(), settings(2, Some("fallback")));

        assert_eq!(client.complete(&messages()).await.unwrap(), "from fallback");
        assert_eq!(
            backend.models(),
            vec!["primary", "primary", "primary", "fallback"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fallback_reports_primary_error_and_keeps_fallback_error() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Connection("connection reset by peer".into())),
            Err(BackendError::Request {
                status: 404,
                body: "unknown model".into(),
            }),
        ]);
        let client = CompletionClient::new(backend.clone(), settings(0, Some("fallback")));

        let err = client.complete(&messages()).await.unwrap_err();
        assert_eq!(backend.models(), vec!["primary", "fallback"]);
        assert!(matches!(err.source, BackendError::Connection(_)));
        let fallback = err.fallback.as_ref().unwrap();
        assert_eq!(fallback.model, "fallback");
        assert!(matches!(fallback.error, BackendError::Request { status: 404, .. }));

        let msg = err.to_string();
        assert!(msg.contains("connection reset by peer"));
        assert!(msg.contains("unknown model"));
    }
}
