// Configuration management module
// TOML settings in the data directory plus the interactive editor

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DocumentConfig, OllamaConfig, OpenAiConfig, RetrievalConfig,
    SessionConfig,
};

/// Get the default data directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
