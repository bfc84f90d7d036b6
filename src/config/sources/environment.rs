//! Environment source: TULP_* variables.
//!
//! `TULP_MAX_CHARS=5000` sets `max_chars`; nested keys use a double underscore
//! (`TULP_LOGGING__FORMAT=json`). Shorthands: `TULP_CONT` for `continuation_retries`,
//! `TULP_LOG_LEVEL` and `TULP_LOG_FORMAT` for the `[logging]` table.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "TULP";

/// Add environment variables to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    if let Ok(cont) = std::env::var("TULP_CONT") {
        let retries: u64 = cont.trim().parse().map_err(|_| {
            ConfigError::Message(format!("TULP_CONT must be a non-negative integer, got '{}'", cont))
        })?;
        builder = builder.set_override("continuation_retries", retries)?;
    }
    if let Ok(level) = std::env::var("TULP_LOG_LEVEL") {
        builder = builder.set_override("logging.level", level.to_lowercase())?;
    }
    if let Ok(format) = std::env::var("TULP_LOG_FORMAT") {
        builder = builder.set_override("logging.format", format.to_lowercase())?;
    }

    Ok(builder)
}
