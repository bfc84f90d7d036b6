//! Provider registry resolution and client construction

use tulp::config::TulpConfig;
use tulp::provider::ProviderRegistry;
use tulp::{exit_codes, TulpError};

fn config(model: &str) -> TulpConfig {
    TulpConfig {
        model: model.to_string(),
        openai_api_key: Some("sk-test-openai".to_string()),
        anthropic_api_key: Some("sk-ant-test".to_string()),
        groq_api_key: Some("gsk-test".to_string()),
        gemini_api_key: Some("gemini-test".to_string()),
        ..TulpConfig::default()
    }
}

#[test]
fn test_models_resolve_to_expected_providers() {
    let registry = ProviderRegistry::with_builtin_providers().unwrap();
    let cases = [
        ("gpt-4o", "openai", "gpt-4o"),
        ("openai.my-model", "openai", "my-model"),
        ("claude-3-5-sonnet-20240620", "anthropic", "claude-3-5-sonnet-20240620"),
        ("groq.llama3-70b-8192", "groq", "llama3-70b-8192"),
        ("ollama.llama3", "ollama", "llama3"),
        ("gemini-1.5-pro", "gemini", "gemini-1.5-pro"),
    ];
    for (model, provider, model_id) in cases {
        let client = registry.create_client(&config(model)).unwrap();
        assert_eq!(client.provider_name(), provider, "model {}", model);
        assert_eq!(client.model_name(), model_id, "model {}", model);
    }
}

#[test]
fn test_unknown_model_lists_patterns() {
    let registry = ProviderRegistry::with_builtin_providers().unwrap();
    let err = registry
        .create_client(&config("mistral-large"))
        .err()
        .unwrap();
    assert_eq!(err.exit_code(), exit_codes::SETUP_ERROR);
    match err {
        TulpError::UnknownModel { supported, .. } => assert!(supported.contains("^claude-")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_key_is_setup_error_before_any_call() {
    let registry = ProviderRegistry::with_builtin_providers().unwrap();
    let config = TulpConfig {
        model: "claude-3-haiku-20240307".to_string(),
        ..TulpConfig::default()
    };
    let err = registry.create_client(&config).err().unwrap();
    assert!(matches!(err, TulpError::ConfigError(_)));
}
