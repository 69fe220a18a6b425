//! Completion backends for the review agents.
//!
//! A [`CompletionBackend`] performs exactly one chat-completion round trip
//! against a model and classifies its failures. Retry, backoff and model
//! fallback live one layer up in [`reliable::CompletionClient`], so a
//! backend implementation never retries on its own.
//!
//! ```text
//! review agent ─▸ CompletionClient ─┬─▸ backend.chat(primary)   (retry w/ backoff)
//!                                   └─▸ backend.chat(fallback)  (at most once)
//! ```

pub mod compatible;
pub mod reliable;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use compatible::OpenAiCompatibleBackend;
pub use reliable::{CompletionClient, CompletionError, ModelSettings};

// ── Conversation ─────────────────────────────────────────────────

/// Role of a message in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role/content pair of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ── Backend response ─────────────────────────────────────────────

/// Response of a single completion call.
///
/// Mirrors the OpenAI `chat/completions` shape: a list of choices, each of
/// which may carry a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    /// Some backends send `null` content for empty completions.
    pub content: Option<String>,
}

impl ChatResponse {
    /// Build a single-choice response carrying `text` (used by fakes).
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: Some(ChatResponseMessage {
                    content: Some(text.into()),
                }),
            }],
        }
    }

    /// Content of the first choice.
    ///
    /// Fails with [`BackendError::NoChoices`] when the response carries no
    /// choice with a message. A message without content yields `""`.
    pub fn first_text(self) -> Result<String, BackendError> {
        let message = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or(BackendError::NoChoices)?;

        match message.content {
            Some(content) => Ok(content),
            None => {
                tracing::warn!("Chat completion returned empty content");
                Ok(String::new())
            }
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────

/// Classified failure of one completion call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// HTTP 429 or an equivalent throttling signal.
    #[error("rate limited by completion backend")]
    RateLimited,

    /// 5xx-class status.
    #[error("completion backend server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Connection reset/refused or request timeout.
    #[error("connection to completion backend failed: {0}")]
    Connection(String),

    /// The backend answered but returned no usable choice.
    #[error("no choices returned from chat completion")]
    NoChoices,

    /// Any other non-success status (bad request, auth failure, unknown model).
    #[error("completion request rejected with status {status}: {body}")]
    Request { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("failed to decode completion response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Server { status, body },
            _ => Self::Request { status, body },
        }
    }

    /// Whether a retry may reasonably succeed.
    ///
    /// A contract violation ([`BackendError::NoChoices`]) follows the same
    /// policy as throttling and server errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server { .. } | Self::Connection(_) | Self::NoChoices
        )
    }
}

// ── Backend trait ────────────────────────────────────────────────

/// A chat-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short backend name used in logs (e.g. "groq").
    fn name(&self) -> &str;

    /// Perform one completion call. Implementations must not retry.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> Result<ChatResponse, BackendError>;
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(BackendError::from_status(429, ""), BackendError::RateLimited);
        assert!(BackendError::from_status(503, "unavailable").is_transient());
        assert!(BackendError::from_status(500, "").is_transient());
        assert!(!BackendError::from_status(400, "bad").is_transient());
        assert!(!BackendError::from_status(401, "auth").is_transient());
        assert!(!BackendError::from_status(404, "model").is_transient());
    }

    #[test]
    fn connection_and_contract_errors_are_transient() {
        assert!(BackendError::Connection("reset by peer".into()).is_transient());
        assert!(BackendError::NoChoices.is_transient());
        assert!(!BackendError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn first_text_requires_a_choice() {
        let empty = ChatResponse::default();
        assert_eq!(empty.first_text(), Err(BackendError::NoChoices));

        let no_message = ChatResponse {
            choices: vec![ChatChoice { message: None }],
        };
        assert_eq!(no_message.first_text(), Err(BackendError::NoChoices));
    }

    #[test]
    fn first_text_tolerates_null_content() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert_eq!(resp.first_text().unwrap(), "");
    }

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }
}
