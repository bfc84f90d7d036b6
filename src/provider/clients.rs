//! HTTP adapters normalizing each vendor API to [`LlmClient`].

use super::{
    build_provider_http_client, failed_status_reply, map_http_error, FinishReason, LlmClient,
    Message, RawReply, Role,
};
use crate::error::TulpError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const OLLAMA_DEFAULT_HOST: &str = "http://127.0.0.1:11434";

const ANTHROPIC_VERSION: &str = "2023-06-01";

// Roles as sent on the wire; error replies are never part of a request, but if one is
// echoed back it is attributed to the assistant.
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant | Role::Error => "assistant",
    }
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: wire_role(msg.role).to_string(),
            content: Some(msg.content.clone()),
        })
        .collect()
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

/// Client for any OpenAI-compatible chat completions endpoint (OpenAI, Groq, Gemini's
/// compatibility layer, or a local server behind a custom base URL).
pub struct OpenAICompatibleClient {
    client: Client,
    provider: String,
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleClient {
    pub fn new(
        provider: impl Into<String>,
        model: String,
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, TulpError> {
        Ok(Self {
            client: build_provider_http_client(timeout)?,
            provider: provider.into(),
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens: None,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Map an OpenAI-style choice to a reply. A content filter hit is reported as an error.
fn choice_to_reply(provider: &str, choice: Choice) -> RawReply {
    let raw_reason = choice.finish_reason.unwrap_or_else(|| "stop".to_string());
    if raw_reason == "content_filter" {
        return RawReply::error(format!("Blocked by the {} content filter", provider));
    }
    let finish_reason = FinishReason::from(raw_reason.as_str());
    if finish_reason == FinishReason::Length {
        warn!(provider, "Reply truncated by the output token limit");
    }
    RawReply::assistant(choice.message.content.unwrap_or_default(), finish_reason)
}

#[async_trait]
impl LlmClient for OpenAICompatibleClient {
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: to_wire(messages),
            max_tokens: self.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.provider, model = %self.model, %url, "Sending chat completion");
        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return failed_status_reply(&self.provider, response).await;
        }

        let completion: ChatCompletionResponse = match response.json().await {
            Ok(completion) => completion,
            Err(e) => {
                return Ok(RawReply::error(format!(
                    "Failed to parse {} response: {}",
                    self.provider, e
                )))
            }
        };

        match completion.choices.into_iter().next() {
            Some(choice) => Ok(choice_to_reply(&self.provider, choice)),
            None => Ok(RawReply::error(format!(
                "{} returned no choices",
                self.provider
            ))),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic messages API client
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        model: String,
        api_key: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, TulpError> {
        Ok(Self {
            client: build_provider_http_client(timeout)?,
            model,
            api_key,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            max_tokens,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Split system text out and merge consecutive same-role turns; the messages API
/// requires strictly alternating user/assistant turns.
fn anthropic_payload(messages: &[Message]) -> (Option<String>, Vec<serde_json::Value>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut turns: Vec<(&'static str, String)> = Vec::new();
    for msg in messages.iter().filter(|m| m.role != Role::System) {
        let role = wire_role(msg.role);
        match turns.last_mut() {
            Some((last_role, content)) if *last_role == role => {
                content.push_str("\n\n");
                content.push_str(&msg.content);
            }
            _ => turns.push((role, msg.content.clone())),
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    let turns = turns
        .into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect();
    (system, turns)
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError> {
        let (system, turns) = anthropic_payload(messages);
        if turns.is_empty() {
            return Ok(RawReply::error("Message list for Anthropic is empty"));
        }

        let mut request_body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": turns,
        });
        if let Some(system) = system {
            request_body["system"] = json!(system);
        }

        let url = format!("{}/messages", self.base_url);
        debug!(provider = "anthropic", model = %self.model, "Sending messages request");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return failed_status_reply("anthropic", response).await;
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
            stop_reason: Option<String>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: Option<String>,
        }

        let completion: AnthropicResponse = match response.json().await {
            Ok(completion) => completion,
            Err(e) => {
                return Ok(RawReply::error(format!(
                    "Failed to parse anthropic response: {}",
                    e
                )))
            }
        };

        let content: String = completion
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        let finish_reason = completion
            .stop_reason
            .as_deref()
            .map(FinishReason::from)
            .unwrap_or(FinishReason::Stop);
        if finish_reason == FinishReason::Length {
            warn!(provider = "anthropic", "Reply truncated by max_tokens");
        }

        Ok(RawReply::assistant(content, finish_reason))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama provider client (local models, native chat API)
pub struct OllamaClient {
    client: Client,
    model: String,
    base_url: String,
}

impl OllamaClient {
    pub fn new(model: String, host: Option<String>, timeout: Duration) -> Result<Self, TulpError> {
        let base_url = host
            .unwrap_or_else(|| OLLAMA_DEFAULT_HOST.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: build_provider_http_client(timeout)?,
            model,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError> {
        let request = json!({
            "model": self.model,
            "messages": to_wire(messages),
            "stream": false,
        });

        let url = format!("{}/api/chat", self.base_url);
        debug!(provider = "ollama", model = %self.model, %url, "Sending chat request");
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return failed_status_reply("ollama", response).await;
        }

        #[derive(Deserialize)]
        struct OllamaChatResponse {
            message: Option<WireMessage>,
            #[serde(default)]
            done_reason: Option<String>,
            #[serde(default)]
            error: Option<String>,
        }

        let completion: OllamaChatResponse = match response.json().await {
            Ok(completion) => completion,
            Err(e) => {
                return Ok(RawReply::error(format!(
                    "Failed to parse ollama response: {}",
                    e
                )))
            }
        };

        if let Some(error) = completion.error {
            return Ok(RawReply::error(format!("ollama: {}", error)));
        }
        let content = completion
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();
        let finish_reason = completion
            .done_reason
            .as_deref()
            .map(FinishReason::from)
            .unwrap_or(FinishReason::Stop);
        Ok(RawReply::assistant(content, finish_reason))
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
