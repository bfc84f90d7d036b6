//! Model Provider Abstraction
//!
//! Common contract every backend adapter satisfies: `generate(messages) -> RawReply`.
//! Ordinary model failures (bad status, content filtering, rate limits) come back as a
//! reply with [`Role::Error`]; only transport and authentication failures are `Err`.

use crate::error::TulpError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use tracing::warn;

pub mod clients;
pub mod registry;

pub use clients::{AnthropicClient, OllamaClient, OpenAICompatibleClient};
pub use registry::ProviderRegistry;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Only ever produced by a client to report a failed call
    Error,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Error => "error",
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    RateLimit,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Error => "error",
            FinishReason::RateLimit => "rate_limit",
            FinishReason::Other(other) => other,
        }
    }

    /// `stop` and `error` end a chunk's exchange; nothing else does.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FinishReason::Stop | FinishReason::Error)
    }
}

impl From<&str> for FinishReason {
    fn from(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" | "eos" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "error" => FinishReason::Error,
            "rate_limit" => FinishReason::RateLimit,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl Serialize for FinishReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FinishReason::from(raw.as_str()))
    }
}

/// Normalized output of one backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReply {
    pub role: Role,
    pub content: String,
    pub finish_reason: FinishReason,
}

impl RawReply {
    pub fn assistant(content: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            finish_reason,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: description.into(),
            finish_reason: FinishReason::Error,
        }
    }

    pub fn rate_limited(description: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: description.into(),
            finish_reason: FinishReason::RateLimit,
        }
    }

    pub fn is_error(&self) -> bool {
        self.role == Role::Error
            || matches!(
                self.finish_reason,
                FinishReason::Error | FinishReason::RateLimit
            )
    }

    /// Convert a failed reply into the run-level error it represents.
    pub fn into_error(self) -> TulpError {
        match self.finish_reason {
            FinishReason::RateLimit => TulpError::ProviderRateLimit(self.content),
            _ => TulpError::BackendReported(self.content),
        }
    }

    /// The reply as it is echoed back in a follow-up request.
    pub fn to_message(&self) -> Message {
        Message::assistant(self.content.clone())
    }
}

/// Backend client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one ordered request and return the normalized reply
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_provider_http_client(timeout: Duration) -> Result<Client, TulpError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| TulpError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

// Failures that happen before a status line is received
pub(crate) fn map_http_error(error: reqwest::Error) -> TulpError {
    if error.is_timeout() {
        TulpError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        TulpError::Transport(format!("Connection error: {}", error))
    } else {
        TulpError::Transport(format!("HTTP error: {}", error))
    }
}

/// Normalize a non-success HTTP status. Authentication failures are fatal; everything
/// else becomes an error reply for the engine to report.
pub(crate) async fn failed_status_reply(
    provider: &str,
    response: Response,
) -> Result<RawReply, TulpError> {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    warn!(provider, status = status.as_u16(), "Backend request failed");
    match status.as_u16() {
        401 | 403 => Err(TulpError::ProviderAuthFailed(format!(
            "{} rejected the credentials ({}): {}",
            provider, status, error_text
        ))),
        429 => Ok(RawReply::rate_limited(format!(
            "{} rate limit exceeded: {}",
            provider, error_text
        ))),
        _ => Ok(RawReply::error(format!(
            "{} request failed with status {}: {}",
            provider, status, error_text
        ))),
    }
}

// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    replies: std::sync::Mutex<std::collections::VecDeque<RawReply>>,
    requests: std::sync::Mutex<Vec<Vec<Message>>>,
    model_name: String,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(replies: Vec<RawReply>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            requests: std::sync::Mutex::new(Vec::new()),
            model_name: "mock-model".to_string(),
        }
    }

    /// Replies that all finish with `stop`.
    pub fn stopping(contents: &[&str]) -> Self {
        Self::new(
            contents
                .iter()
                .map(|c| RawReply::assistant(*c, FinishReason::Stop))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockProvider {
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RawReply::error("mock provider has no scripted reply left")))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
