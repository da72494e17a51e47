//! LLM integration for the careline chatbot
//!
//! Features:
//! - OpenAI-compatible chat completions with function calling (OpenAI, Azure, local servers)
//! - Retry with exponential backoff on transient failures
//! - Tool schema builder
//! - A scripted backend for tests and offline development

pub mod backend;
pub mod factory;
pub mod prompt;
pub mod scripted;

pub use backend::{LlmBackend, OpenAIBackend, OpenAIConfig};
pub use factory::LlmFactory;
pub use prompt::ToolBuilder;
pub use scripted::ScriptedBackend;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
