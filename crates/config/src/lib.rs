//! Configuration management for the careline chatbot
//!
//! Supports loading configuration from:
//! - `config/default` and `config/<env>` files (TOML, YAML or JSON)
//! - Environment variables (`CARELINE_` prefix, `__` as section separator)

pub mod constants;
pub mod prompts;
pub mod settings;

pub use prompts::PromptsConfig;
pub use settings::{
    load_settings, load_settings_from, AdminConfig, KnowledgeConfig, LlmConfig, LlmProviderKind,
    ObservabilityConfig, PersistenceConfig, RuntimeEnvironment, ServerConfig, Settings,
    TenancyConfig, TimeoutConfig, WebhookConfig, WhatsAppConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
