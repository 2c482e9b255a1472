use super::load_existing_config as load_existing_config_impl;
use super::test_ollama_connection;
use crate::config::OllamaConfig;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = load_existing_config_impl(temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.ollama.batch_size > 0);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn load_existing_config_falls_back_on_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[ollama\nport = 0")
        .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn unreachable_ollama_reports_failure() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };

    assert!(!test_ollama_connection(&ollama));
}
