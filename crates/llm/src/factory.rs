//! Backend construction from settings
//!
//! ```ignore
//! let llm = LlmFactory::from_settings(&settings.llm, Duration::from_secs(settings.timeouts.llm_secs))?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use careline_config::{LlmConfig, LlmProviderKind};

use crate::backend::{LlmBackend, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// Creates LLM backends
pub struct LlmFactory;

impl LlmFactory {
    /// Create a backend for the configured provider
    pub fn from_settings(
        config: &LlmConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn LlmBackend>, LlmError> {
        let openai_config = Self::backend_config(config, timeout)?;

        tracing::info!(
            provider = ?config.provider,
            model = %openai_config.model,
            endpoint = %openai_config.endpoint,
            "Creating LLM backend"
        );

        Ok(Arc::new(OpenAIBackend::new(openai_config)?))
    }

    fn backend_config(config: &LlmConfig, timeout: Duration) -> Result<OpenAIConfig, LlmError> {
        let endpoint = config.resolved_endpoint();

        let base = match config.provider {
            LlmProviderKind::OpenAi => {
                let api_key = Self::require_key(config, "OpenAI")?;
                OpenAIConfig {
                    endpoint,
                    ..OpenAIConfig::openai(api_key, &config.model)
                }
            }
            LlmProviderKind::Azure => {
                if config.endpoint.is_none() {
                    return Err(LlmError::Configuration(
                        "Azure OpenAI requires llm.endpoint".to_string(),
                    ));
                }
                let api_key = Self::require_key(config, "Azure OpenAI")?;
                OpenAIConfig::azure(endpoint, api_key, &config.model, &config.azure_api_version)
            }
            LlmProviderKind::Local => {
                let mut local = OpenAIConfig::local(endpoint, &config.model);
                if let Some(key) = &config.api_key {
                    local.api_key = key.clone();
                }
                local
            }
        };

        Ok(OpenAIConfig {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            timeout,
            ..base
        })
    }

    fn require_key(config: &LlmConfig, provider: &str) -> Result<String, LlmError> {
        config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::Configuration(format!("{} requires llm.api_key", provider)))
    }
}
