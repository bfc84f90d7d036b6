//! Provider registry: ordered model-name patterns mapped to client factories.
//!
//! Entries are added by explicit `register` calls; the first pattern that matches the
//! configured model wins.

use super::clients::{
    AnthropicClient, OllamaClient, OpenAICompatibleClient, GEMINI_BASE_URL, GROQ_BASE_URL,
    OPENAI_BASE_URL,
};
use super::LlmClient;
use crate::config::TulpConfig;
use crate::error::TulpError;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builds a client for a model name that matched the entry's pattern.
pub type ClientFactory = fn(&str, &TulpConfig) -> Result<Arc<dyn LlmClient>, TulpError>;

/// One registered provider.
pub struct ProviderEntry {
    pub name: String,
    pub pattern: Regex,
    pub description: String,
    factory: ClientFactory,
}

impl ProviderEntry {
    pub fn matches(&self, model: &str) -> bool {
        self.pattern.is_match(model)
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in adapter.
    pub fn with_builtin_providers() -> Result<Self, TulpError> {
        let mut registry = Self::new();
        registry.register(
            "openai",
            r"^(gpt-|chatgpt-|openai\.)",
            "Any OpenAI model, or 'openai.<MODEL_ID>' for unlisted models and \
             OpenAI-compatible servers (see --openai-baseurl); requires openai_api_key \
             unless the base URL is local",
            create_openai_client,
        )?;
        registry.register(
            "anthropic",
            r"^claude-",
            "Any Anthropic Claude model; requires anthropic_api_key",
            create_anthropic_client,
        )?;
        registry.register(
            "groq",
            r"^groq\.",
            "Any Groq model id prefixed with 'groq.'; requires groq_api_key",
            create_groq_client,
        )?;
        registry.register(
            "ollama",
            r"^ollama\.",
            "Any Ollama model prefixed with 'ollama.'; requires a running Ollama service \
             (see --ollama-host)",
            create_ollama_client,
        )?;
        registry.register(
            "gemini",
            r"^gemini",
            "Any Google Gemini model; requires gemini_api_key",
            create_gemini_client,
        )?;
        Ok(registry)
    }

    /// Append an entry. Earlier registrations take precedence on overlapping patterns.
    pub fn register(
        &mut self,
        name: &str,
        pattern: &str,
        description: &str,
        factory: ClientFactory,
    ) -> Result<(), TulpError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            TulpError::ConfigError(format!("Invalid model pattern for {}: {}", name, e))
        })?;
        self.entries.push(ProviderEntry {
            name: name.to_string(),
            pattern,
            description: description.to_string(),
            factory,
        });
        Ok(())
    }

    /// First entry whose pattern matches `model`.
    pub fn resolve(&self, model: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|entry| entry.matches(model))
    }

    /// Instantiate the client for `config.model`.
    pub fn create_client(&self, config: &TulpConfig) -> Result<Arc<dyn LlmClient>, TulpError> {
        let entry = self
            .resolve(&config.model)
            .ok_or_else(|| TulpError::UnknownModel {
                model: config.model.clone(),
                supported: self.describe(),
            })?;
        debug!(model = %config.model, provider = %entry.name, "Resolved provider");
        let client = (entry.factory)(&config.model, config)?;
        info!(
            provider = client.provider_name(),
            model = client.model_name(),
            "Backend client ready"
        );
        Ok(client)
    }

    /// One line per registered pattern.
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("   - {} : {}", entry.pattern.as_str(), entry.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }
}

fn timeout(config: &TulpConfig) -> Duration {
    Duration::from_secs(config.request_timeout_secs)
}

fn require_key(key: &Option<String>, setting: &str, provider: &str) -> Result<String, TulpError> {
    match key.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k.to_string()),
        _ => Err(TulpError::ConfigError(format!(
            "{} API key is missing. Set TULP_{} in the environment, add {} to the \
             config file, or pass --{}",
            provider,
            setting.to_uppercase(),
            setting,
            setting.replace('_', "-")
        ))),
    }
}

fn is_local_url(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

fn create_openai_client(
    model: &str,
    config: &TulpConfig,
) -> Result<Arc<dyn LlmClient>, TulpError> {
    let model_id = model.strip_prefix("openai.").unwrap_or(model).to_string();
    let base_url = config
        .openai_baseurl
        .clone()
        .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
    let api_key = if is_local_url(&base_url) {
        config.openai_api_key.clone()
    } else {
        Some(require_key(&config.openai_api_key, "openai_api_key", "OpenAI")?)
    };
    Ok(Arc::new(OpenAICompatibleClient::new(
        "openai",
        model_id,
        api_key,
        base_url,
        timeout(config),
    )?))
}

fn create_anthropic_client(
    model: &str,
    config: &TulpConfig,
) -> Result<Arc<dyn LlmClient>, TulpError> {
    let api_key = require_key(&config.anthropic_api_key, "anthropic_api_key", "Anthropic")?;
    Ok(Arc::new(AnthropicClient::new(
        model.to_string(),
        api_key,
        config.max_output_tokens,
        timeout(config),
    )?))
}

fn create_groq_client(model: &str, config: &TulpConfig) -> Result<Arc<dyn LlmClient>, TulpError> {
    let api_key = require_key(&config.groq_api_key, "groq_api_key", "Groq")?;
    let model_id = model.strip_prefix("groq.").unwrap_or(model).to_string();
    Ok(Arc::new(OpenAICompatibleClient::new(
        "groq",
        model_id,
        Some(api_key),
        GROQ_BASE_URL.to_string(),
        timeout(config),
    )?))
}

fn create_ollama_client(
    model: &str,
    config: &TulpConfig,
) -> Result<Arc<dyn LlmClient>, TulpError> {
    let model_id = model.strip_prefix("ollama.").unwrap_or(model).to_string();
    Ok(Arc::new(OllamaClient::new(
        model_id,
        config.ollama_host.clone(),
        timeout(config),
    )?))
}

fn create_gemini_client(
    model: &str,
    config: &TulpConfig,
) -> Result<Arc<dyn LlmClient>, TulpError> {
    let api_key = require_key(&config.gemini_api_key, "gemini_api_key", "Gemini")?;
    Ok(Arc::new(
        OpenAICompatibleClient::new(
            "gemini",
            model.to_string(),
            Some(api_key),
            GEMINI_BASE_URL.to_string(),
            timeout(config),
        )?
        .with_max_tokens(config.max_output_tokens),
    ))
}
