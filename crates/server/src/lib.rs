//! careline HTTP server
//!
//! Hosts the WhatsApp webhook, the admin API and the Prometheus endpoint, and
//! provides the Graph API implementation of the engine's `Messenger`.

pub mod admin;
pub mod http;
pub mod metrics;
pub mod state;
pub mod webhook;
pub mod whatsapp;

pub use http::create_router;
pub use metrics::{init_metrics, record_webhook_event};
pub use state::AppState;
pub use whatsapp::WhatsAppMessenger;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Agent error: {0}")]
    Agent(#[from] careline_agent::AgentError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] careline_persistence::PersistenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Agent(_) | ServerError::Persistence(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        StatusCode::from(&err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
