//! Integration tests for the layered configuration

use super::test_utils::with_clean_env;
use tempfile::TempDir;
use tulp::cli::{Cli, RunContext};
use tulp::config::ConfigLoader;
use clap::Parser;

#[test]
fn test_cli_overrides_environment_and_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("custom.toml");
    std::fs::write(&config_file, "model = \"gpt-4o-mini\"\nmax_chars = 100\n").unwrap();

    let context = with_clean_env(&temp_dir, || {
        std::env::set_var("TULP_MAX_CHARS", "200");
        std::env::set_var("TULP_CONT", "1");
        let path = config_file.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "tulp",
            "--config",
            path.as_str(),
            "--max-chars",
            "300",
            "--model",
            "claude-3-haiku-20240307",
            "hello",
        ])
        .unwrap();
        RunContext::new(&cli)
    })
    .unwrap();

    let config = context.config();
    assert_eq!(config.max_chars, 300);
    assert_eq!(config.continuation_retries, 1);
    assert_eq!(config.model, "claude-3-haiku-20240307");
}

#[test]
fn test_global_file_is_optional() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_clean_env(&temp_dir, || ConfigLoader::load(None)).unwrap();
    assert_eq!(config.model, "gpt-4o");
    assert_eq!(config.max_chars, 1_000_000);
    assert_eq!(config.grammar, "verbose");
}

#[test]
fn test_invalid_environment_value_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = with_clean_env(&temp_dir, || {
        std::env::set_var("TULP_CONT", "many");
        ConfigLoader::load(None)
    });
    assert!(result.is_err());
}

#[test]
fn test_invalid_grammar_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("tulp")).unwrap();
    std::fs::write(
        temp_dir.path().join("tulp/config.toml"),
        "grammar = \"xml\"\n",
    )
    .unwrap();

    let result = with_clean_env(&temp_dir, || {
        let cli = Cli::try_parse_from(["tulp", "x"]).unwrap();
        RunContext::new(&cli)
    });
    let err = result.err().unwrap();
    assert!(err.to_string().contains("unknown grammar"));
}
