//! Application state shared by all handlers

use std::sync::Arc;

use careline_agent::ChatEngine;
use careline_config::Settings;
use metrics_exporter_prometheus::PrometheusHandle;
use subtle::ConstantTimeEq;

use crate::whatsapp::WhatsAppMessenger;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub engine: Arc<ChatEngine>,
    /// Graph API client, also used by the tenant self-test
    pub whatsapp: Arc<WhatsAppMessenger>,
    /// Set when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Settings, engine: ChatEngine, whatsapp: Arc<WhatsAppMessenger>) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            whatsapp,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Constant-time comparison against the configured admin secret
    ///
    /// Always false when no secret is configured.
    pub fn admin_authorized(&self, secret: Option<&str>) -> bool {
        secret_matches(self.config.admin.secret.as_deref(), secret)
    }
}

fn secret_matches(expected: Option<&str>, given: Option<&str>) -> bool {
    match (expected, given) {
        (Some(expected), Some(given)) if !expected.is_empty() => {
            given.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(Some("s3cret"), Some("s3cret")));
        assert!(!secret_matches(Some("s3cret"), Some("s3creT")));
        assert!(!secret_matches(Some("s3cret"), Some("s3cret-longer")));
        assert!(!secret_matches(Some("s3cret"), None));
    }

    #[test]
    fn test_missing_secret_rejects_everything() {
        assert!(!secret_matches(None, Some("anything")));
        assert!(!secret_matches(Some(""), Some("")));
    }
}
