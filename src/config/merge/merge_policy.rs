//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources (global file, environment) override these keys; command-line
/// overrides are applied after deserialization.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("model", crate::config::default_model())?
        .set_default("max_chars", crate::config::default_max_chars() as u64)?
        .set_default("continuation_retries", 0u64)?
        .set_default(
            "max_execution_retries",
            crate::config::default_max_execution_retries() as u64,
        )?
        .set_default("interpreter", crate::config::default_interpreter())?
        .set_default(
            "request_timeout_secs",
            crate::config::default_request_timeout_secs(),
        )?
        .set_default(
            "max_output_tokens",
            crate::config::default_max_output_tokens() as u64,
        )?
        .set_default("grammar", crate::config::default_grammar())
}
