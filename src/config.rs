//! Configuration System
//!
//! Explicitly constructed configuration object passed by reference into every
//! component. Layers, lowest to highest precedence: built-in defaults, the global
//! config file, `TULP_*` environment variables, then command-line overrides.

use crate::logging::LoggingConfig;
use crate::protocol::TagGrammar;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TulpConfig {
    /// Model name; selects the provider through the registry patterns
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum characters per input chunk
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Continuation requests allowed per chunk when a reply is cut short
    #[serde(default)]
    pub continuation_retries: u32,

    /// Generate-execute-repair attempts in execution mode
    #[serde(default = "default_max_execution_retries")]
    pub max_execution_retries: u32,

    /// Write the final output (or, in execution mode, the generated program) here
    #[serde(default)]
    pub write_file: Option<PathBuf>,

    /// Ask for a program instead of a direct answer, then run it
    #[serde(default)]
    pub execute: bool,

    /// Persist every backend request/response under this directory
    #[serde(default)]
    pub inspect_dir: Option<PathBuf>,

    /// Interpreter used to run generated programs (`<interpreter> -c <program>`)
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Per-call network timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Output token cap for providers that require one
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Reply marker preset: verbose or terse
    #[serde(default = "default_grammar")]
    pub grammar: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_baseurl: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub ollama_host: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub(crate) fn default_model() -> String {
    "gpt-4o".to_string()
}

pub(crate) fn default_max_chars() -> usize {
    1_000_000
}

pub(crate) fn default_max_execution_retries() -> u32 {
    5
}

pub(crate) fn default_interpreter() -> String {
    "python3".to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_max_output_tokens() -> u32 {
    4096
}

pub(crate) fn default_grammar() -> String {
    "verbose".to_string()
}

impl Default for TulpConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_chars: default_max_chars(),
            continuation_retries: 0,
            max_execution_retries: default_max_execution_retries(),
            write_file: None,
            execute: false,
            inspect_dir: None,
            interpreter: default_interpreter(),
            request_timeout_secs: default_request_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            grammar: default_grammar(),
            openai_api_key: None,
            openai_baseurl: None,
            anthropic_api_key: None,
            groq_api_key: None,
            gemini_api_key: None,
            ollama_host: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub max_chars: Option<usize>,
    pub continuation_retries: Option<u32>,
    pub write_file: Option<PathBuf>,
    pub execute: bool,
    pub inspect_dir: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_baseurl: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_host: Option<String>,
}

impl TulpConfig {
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut self.model, &overrides.model);
        set(&mut self.max_chars, &overrides.max_chars);
        set(&mut self.continuation_retries, &overrides.continuation_retries);
        set_opt(&mut self.write_file, &overrides.write_file);
        set_opt(&mut self.inspect_dir, &overrides.inspect_dir);
        if overrides.execute {
            self.execute = true;
        }
        set_opt(&mut self.openai_api_key, &overrides.openai_api_key);
        set_opt(&mut self.openai_baseurl, &overrides.openai_baseurl);
        set_opt(&mut self.anthropic_api_key, &overrides.anthropic_api_key);
        set_opt(&mut self.groq_api_key, &overrides.groq_api_key);
        set_opt(&mut self.gemini_api_key, &overrides.gemini_api_key);
        set_opt(&mut self.ollama_host, &overrides.ollama_host);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.model.trim().is_empty() {
            errors.push("model cannot be empty".to_string());
        }
        if self.max_chars == 0 {
            errors.push("max_chars must be greater than zero".to_string());
        }
        if self.max_execution_retries == 0 {
            errors.push("max_execution_retries must be greater than zero".to_string());
        }
        if self.interpreter.trim().is_empty() {
            errors.push("interpreter cannot be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be greater than zero".to_string());
        }
        if TagGrammar::by_name(&self.grammar).is_none() {
            errors.push(format!(
                "unknown grammar '{}' (expected 'verbose' or 'terse')",
                self.grammar
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Tag grammar selected by `grammar`; falls back to the verbose preset.
    pub fn tag_grammar(&self) -> TagGrammar {
        TagGrammar::by_name(&self.grammar).unwrap_or_default()
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(key: &Option<String>) -> Option<String> {
            key.as_ref().map(|k| {
                if k.chars().count() > 8 {
                    let head: String = k.chars().take(4).collect();
                    let tail: String = k.chars().skip(k.chars().count() - 4).collect();
                    format!("{}****{}", head, tail)
                } else {
                    "****".to_string()
                }
            })
        }

        let mut copy = self.clone();
        copy.openai_api_key = mask(&self.openai_api_key);
        copy.anthropic_api_key = mask(&self.anthropic_api_key);
        copy.groq_api_key = mask(&self.groq_api_key);
        copy.gemini_api_key = mask(&self.gemini_api_key);
        copy
    }
}
