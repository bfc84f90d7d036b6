//! Configuration loader: assembles the layered sources into a [`TulpConfig`].

use super::merge::merge_policy;
use super::sources::{environment, global_file};
use super::TulpConfig;
use crate::error::TulpError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration: defaults, then `config_path` (required when given) or the
    /// global file (optional), then `TULP_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<TulpConfig, TulpError> {
        let mut builder = merge_policy::builder_with_defaults()?;

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TulpError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!(config_path = %path.display(), "Loading explicit configuration file");
                builder = builder.add_source(File::from(path.to_path_buf()).required(true));
            }
            None => {
                builder = global_file::add_to_builder(builder)?;
            }
        }

        builder = environment::add_to_builder(builder)?;

        let config: TulpConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file on top of the defaults, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<TulpConfig, TulpError> {
        let config: TulpConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Location of the global configuration file, if a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_tulp_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("TULP_") {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            r#"
model = "claude-3-5-sonnet-20240620"
max_chars = 2000
continuation_retries = 2
grammar = "terse"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&config_file).unwrap();
        assert_eq!(config.model, "claude-3-5-sonnet-20240620");
        assert_eq!(config.max_chars, 2000);
        assert_eq!(config.continuation_retries, 2);
        assert_eq!(config.grammar, "terse");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.max_execution_retries, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, TulpError::ConfigError(_)));
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_tulp_env();

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "model = \"gpt-4o-mini\"\nmax_chars = 10\n").unwrap();

        std::env::set_var("TULP_MAX_CHARS", "5000");
        std::env::set_var("TULP_CONT", "3");
        std::env::set_var("TULP_OPENAI_API_KEY", "sk-env");
        std::env::set_var("TULP_LOG_LEVEL", "DEBUG");

        let result = ConfigLoader::load(Some(&config_file));
        clear_tulp_env();

        let config = result.unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_chars, 5000);
        assert_eq!(config.continuation_retries, 3);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_global_file_under_xdg_config_home() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_tulp_env();

        let temp_dir = TempDir::new().unwrap();
        let tulp_dir = temp_dir.path().join("tulp");
        std::fs::create_dir_all(&tulp_dir).unwrap();
        std::fs::write(tulp_dir.join("config.toml"), "model = \"ollama.llama3\"\n").unwrap();

        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let path = ConfigLoader::global_config_path();
        let result = ConfigLoader::load(None);

        match original {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(path, Some(tulp_dir.join("config.toml")));
        assert_eq!(result.unwrap().model, "ollama.llama3");
    }
}
