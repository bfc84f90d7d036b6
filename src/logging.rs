//! Logging System
//!
//! Structured diagnostics through `tracing`. Standard output carries only the product
//! of a run, so every diagnostic goes to standard error or to a log file.

use crate::error::TulpError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding a full `EnvFilter` directive string.
pub const LOG_FILTER_ENV: &str = "TULP_LOG";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path, required when output is "file"
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format on stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Stderr,
    File(PathBuf),
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. `TULP_LOG` filter directives
/// 2. The resolved configuration (CLI flags already folded in)
/// 3. Defaults
pub fn init_logging(config: &LoggingConfig) -> Result<(), TulpError> {
    let filter = build_env_filter(config)?;
    let format = validate_format(&config.format)?;
    let destination = parse_destination(config)?;

    let base_subscriber = Registry::default().with(filter);

    let result = match (format, destination) {
        ("json", Destination::Stderr) => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        ("json", Destination::File(path)) => {
            let file_writer = open_log_file(&path)?;
            base_subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_writer(file_writer),
                )
                .try_init()
        }
        (_, Destination::File(path)) => {
            let file_writer = open_log_file(&path)?;
            base_subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(false)
                        .with_writer(file_writer),
                )
                .try_init()
        }
        (_, Destination::Stderr) => base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| TulpError::ConfigError(format!("Failed to initialize logging: {}", e)))
}

fn open_log_file(path: &PathBuf) -> Result<std::fs::File, TulpError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TulpError::ConfigError(format!("Failed to create log directory: {}", e))
            })?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TulpError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

/// Build environment filter from `TULP_LOG` or the config
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, TulpError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_FILTER_ENV) {
        return Ok(filter);
    }

    let level = config.level.as_str();
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    for (module, module_level) in &config.modules {
        let directive = format!("{}={}", module, module_level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| TulpError::ConfigError(format!("Invalid log directive: {}", e)))?,
        );
    }

    Ok(filter)
}

fn validate_format(format: &str) -> Result<&str, TulpError> {
    match format {
        "json" | "text" => Ok(format),
        other => Err(TulpError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn parse_destination(config: &LoggingConfig) -> Result<Destination, TulpError> {
    match config.output.as_str() {
        "stderr" => Ok(Destination::Stderr),
        "file" => config
            .file
            .clone()
            .map(Destination::File)
            .ok_or_else(|| {
                TulpError::ConfigError("Log output 'file' requires logging.file".to_string())
            }),
        other => Err(TulpError::ConfigError(format!(
            "Invalid log output: {} (must be 'stderr' or 'file')",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
        assert!(config.color);
    }

    #[test]
    fn test_parse_destination() {
        let config = LoggingConfig::default();
        assert_eq!(parse_destination(&config).unwrap(), Destination::Stderr);

        let mut config = LoggingConfig {
            output: "file".to_string(),
            ..Default::default()
        };
        assert!(parse_destination(&config).is_err());
        config.file = Some(PathBuf::from("/tmp/tulp.log"));
        assert_eq!(
            parse_destination(&config).unwrap(),
            Destination::File(PathBuf::from("/tmp/tulp.log"))
        );

        config.output = "stdout".to_string();
        assert!(parse_destination(&config).is_err());
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("json").is_ok());
        assert!(validate_format("text").is_ok());
        assert!(validate_format("xml").is_err());
    }

    #[test]
    fn test_invalid_module_directive_is_rejected() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("tulp::parser".to_string(), "loud".to_string());
        if std::env::var(LOG_FILTER_ENV).is_err() {
            assert!(build_env_filter(&config).is_err());
        }
    }
}
