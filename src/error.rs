//! Error types for the tulp orchestration engine.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the orchestration engine and its collaborators.
///
/// Components never terminate the process; the binary maps these to exit codes
/// through [`TulpError::exit_code`].
#[derive(Debug, Error)]
pub enum TulpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("{0}")]
    BackendDeclared(String),

    #[error("Backend reported an error: {0}")]
    BackendReported(String),

    #[error("No program was produced after {attempts} attempts")]
    MissingProgram { attempts: u32 },

    #[error("Generated program failed after {attempts} attempts: {last_error}")]
    ExecutionFailed { attempts: u32, last_error: String },

    #[error("Unsupported model: '{model}'. Supported patterns:\n{supported}")]
    UnknownModel { model: String, supported: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to write output to {path:?}: {message}")]
    OutputError { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl TulpError {
    /// Exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            TulpError::UnknownModel { .. } | TulpError::ConfigError(_) => {
                exit_codes::SETUP_ERROR
            }
            TulpError::Interrupted => exit_codes::INTERRUPTED,
            TulpError::Transport(_)
            | TulpError::ProviderAuthFailed(_)
            | TulpError::ProviderRateLimit(_)
            | TulpError::ProviderRequestFailed(_)
            | TulpError::BackendDeclared(_)
            | TulpError::BackendReported(_)
            | TulpError::MissingProgram { .. }
            | TulpError::ExecutionFailed { .. }
            | TulpError::OutputError { .. }
            | TulpError::Io(_) => exit_codes::BACKEND_ERROR,
        }
    }
}

impl From<config::ConfigError> for TulpError {
    fn from(err: config::ConfigError) -> Self {
        TulpError::ConfigError(err.to_string())
    }
}
