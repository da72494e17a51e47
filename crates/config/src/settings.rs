//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{endpoints, llm, tenancy, timeouts};
use crate::{ConfigError, PromptsConfig};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation
    #[default]
    Development,
    Staging,
    /// All validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// WhatsApp Business (Graph API) settings
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// Tenant resolution and caching
    #[serde(default)]
    pub tenancy: TenancyConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// Persistence configuration (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_persistence()?;
        self.validate_timeouts()?;

        if self.environment.is_strict() && self.whatsapp.verify_token.is_none() {
            return Err(ConfigError::MissingField("whatsapp.verify_token".to_string()));
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }
        if self.llm.max_history_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_history_turns".to_string(),
                message: "Must keep at least one turn".to_string(),
            });
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        if !self.persistence.enabled {
            return Ok(());
        }
        if self.persistence.keyspace.trim().is_empty() {
            return Err(ConfigError::MissingField("persistence.keyspace".to_string()));
        }
        if self.persistence.hosts.is_empty() {
            return Err(ConfigError::MissingField("persistence.hosts".to_string()));
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        let t = &self.timeouts;
        for (field, value) in [
            ("timeouts.llm_secs", t.llm_secs),
            ("timeouts.outbound_secs", t.outbound_secs),
            ("timeouts.event_secs", t.event_secs),
            ("knowledge.fetch_timeout_secs", self.knowledge.fetch_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,

    #[serde(default = "default_graph_api_version")]
    pub api_version: String,

    /// Webhook verification secret; when unset any token is accepted
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Template sent to new contacts when the tenant has none configured
    #[serde(default)]
    pub default_welcome_template: Option<String>,

    #[serde(default = "default_template_language")]
    pub template_language: String,
}

fn default_graph_api_base() -> String {
    endpoints::GRAPH_API_BASE.to_string()
}
fn default_graph_api_version() -> String {
    endpoints::GRAPH_API_VERSION.to_string()
}
fn default_template_language() -> String {
    "en".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            graph_api_base: default_graph_api_base(),
            api_version: default_graph_api_version(),
            verify_token: None,
            default_welcome_template: None,
            template_language: default_template_language(),
        }
    }
}

impl WhatsAppConfig {
    /// `<base>/<version>/<phone_number_id>/messages`
    pub fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.graph_api_base.trim_end_matches('/'),
            self.api_version,
            phone_number_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Azure,
    /// Any OpenAI-compatible local server (Ollama, vLLM)
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Base URL; provider default when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Non-system turns sent with each request
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Azure OpenAI api-version query parameter
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}
fn default_model() -> String {
    llm::DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    512
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_history_turns() -> usize {
    llm::MAX_HISTORY_TURNS
}
fn default_azure_api_version() -> String {
    "2024-06-01".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            endpoint: None,
            api_key: default_api_key(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            max_history_turns: default_max_history_turns(),
            azure_api_version: default_azure_api_version(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_endpoint(&self) -> String {
        match (&self.endpoint, self.provider) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, LlmProviderKind::Local) => endpoints::LOCAL_LLM_DEFAULT.to_string(),
            (None, _) => endpoints::OPENAI_DEFAULT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,

    #[serde(default = "default_tenant_query_param")]
    pub tenant_query_param: String,

    /// Used when neither header, query nor payload identify a tenant
    #[serde(default)]
    pub default_tenant_id: Option<String>,

    /// 0 disables expiry
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_tenant_header() -> String {
    tenancy::TENANT_HEADER.to_string()
}
fn default_tenant_query_param() -> String {
    tenancy::TENANT_QUERY_PARAM.to_string()
}
fn default_cache_ttl() -> u64 {
    tenancy::CACHE_TTL_SECS
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant_header: default_tenant_header(),
            tenant_query_param: default_tenant_query_param(),
            default_tenant_id: None,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory holding per-tenant knowledge files
    #[serde(default = "default_knowledge_dir")]
    pub directory: String,

    /// Shared file used when a tenant has no URL or file of its own
    #[serde(default = "default_knowledge_file")]
    pub default_file: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_knowledge_dir() -> String {
    "knowledge".to_string()
}
fn default_knowledge_file() -> String {
    "default.txt".to_string()
}
fn default_fetch_timeout() -> u64 {
    timeouts::KNOWLEDGE_FETCH_SECS
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            directory: default_knowledge_dir(),
            default_file: default_knowledge_file(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Admin endpoint access
///
/// The shared secret is a stand-in until admin routes move behind the
/// platform's auth gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// When unset every admin request is rejected
    #[serde(default)]
    pub secret: Option<String>,
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "careline".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Bounds on external calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_secs: u64,

    #[serde(default = "default_outbound_timeout")]
    pub outbound_secs: u64,

    /// Events taking longer than this are logged as slow; they are never cut off
    #[serde(default = "default_event_timeout")]
    pub event_secs: u64,
}

fn default_llm_timeout() -> u64 {
    timeouts::LLM_SECS
}
fn default_outbound_timeout() -> u64 {
    timeouts::OUTBOUND_SECS
}
fn default_event_timeout() -> u64 {
    timeouts::EVENT_SECS
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_secs: default_llm_timeout(),
            outbound_secs: default_outbound_timeout(),
            event_secs: default_event_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Acknowledge deliveries before processing them
    #[serde(default = "default_true")]
    pub async_processing: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            async_processing: true,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Serve Prometheus metrics on /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` relative to the working directory
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from a config directory, then environment variables
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::from(dir.join("default")).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("CARELINE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(environment = ?settings.environment, "Settings loaded");

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.tenancy.cache_ttl_secs, 600);
        assert_eq!(settings.tenancy.tenant_header, "x-tenant-id");
        assert!(settings.webhook.async_processing);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.llm.temperature = 2.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.timeouts.llm_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.persistence.enabled = true;
        settings.persistence.keyspace = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_production_requires_verify_token() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        assert!(matches!(settings.validate(), Err(ConfigError::MissingField(_))));

        settings.whatsapp.verify_token = Some("s3cret".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_layered_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[server]\nport = 9000\n\n[tenancy]\ndefault_tenant_id = \"acme\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "environment = \"staging\"\n\n[whatsapp]\nverify_token = \"tok\"\n\n[server]\nport = 9100\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.tenancy.default_tenant_id.as_deref(), Some("acme"));
        assert_eq!(settings.whatsapp.verify_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(dir.path(), None).unwrap();
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_messages_url() {
        let wa = WhatsAppConfig::default();
        assert_eq!(
            wa.messages_url("12345"),
            "https://graph.facebook.com/v21.0/12345/messages"
        );
    }

    #[test]
    fn test_llm_endpoint_resolution() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.resolved_endpoint(), endpoints::OPENAI_DEFAULT);
        llm.provider = LlmProviderKind::Local;
        assert_eq!(llm.resolved_endpoint(), endpoints::LOCAL_LLM_DEFAULT);
        llm.endpoint = Some("http://llm:8000/v1".to_string());
        assert_eq!(llm.resolved_endpoint(), "http://llm:8000/v1");
    }
}
