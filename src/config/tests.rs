use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                model: "test-model".to_string(),
                batch_size: 32,
                embedding_dimension: 768,
                normalize_embeddings: false,
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [retrieval]
            top_k = 3
        "#;

        let config: Config = toml::from_str(partial_toml).expect("partial config should parse");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.chunking.split_length, 200);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [document]
            pdf_path = "data/current_april_2025_vol_9.pdf"
            title = "AWA Current Magazine"

            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            model = "all-minilm:latest"
            batch_size = 32
            embedding_dimension = 384
            normalize_embeddings = true

            [openai]
            base_url = "https://api.openai.com/v1"
            model = "gpt-4o-mini"
            timeout_seconds = 60

            [chunking]
            split_length = 200
            split_overlap = 20

            [retrieval]
            top_k = 10
            query_prefix = ""

            [session]
            max_history = 10
            include_history = false
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml correctly");
        assert!(config.validate().is_ok());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn default_dir_is_named_after_the_app() {
        if let Ok(dir) = get_config_dir() {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .expect("dir has a name");
            assert!(name.ends_with("magazine-qa"));
        }
    }
}
