//! Conversation engine for the WhatsApp chatbot
//!
//! Features:
//! - Tenant resolution from header, query parameter or phone-number-id
//! - Per-contact sessions with transcripts and LLM turn history
//! - Function-calling intent router over a fixed intent catalog
//! - Appointment, support, check-in, feedback and registration flows
//! - Knowledge lookup with substring search and LLM summarisation
//! - Symptom triage with fuzzy specialty matching
//! - Notifications emitted after each flow commits

pub mod contacts;
pub mod engine;
pub mod flows;
pub mod fuzzy;
pub mod knowledge;
pub mod messenger;
pub mod metrics;
pub mod notify;
pub mod router;
pub mod tenant;
pub mod triage;

pub use contacts::{ContactManager, WelcomeConfig};
pub use engine::{
    ChatEngine, EngineComponents, EventOutcome, InboundContent, InboundEvent, InboundMessage,
};
pub use flows::{FlowHandlers, FlowOutcome};
pub use knowledge::KnowledgeStore;
pub use messenger::{Messenger, MessengerError, OutboundMessage, RecordingMessenger};
pub use notify::{NotificationEmitter, NotificationEvent};
pub use router::{IntentRouter, RouteDecision};
pub use tenant::{TenantRequest, TenantResolver};
pub use triage::Triage;

use std::time::Duration;

use careline_core::{GenerateRequest, GenerateResponse};
use careline_llm::{LlmBackend, LlmError};
use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] careline_persistence::PersistenceError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        AgentError::Llm(err.to_string())
    }
}

impl From<careline_tools::ToolsError> for AgentError {
    fn from(err: careline_tools::ToolsError) -> Self {
        AgentError::Tool(err.to_string())
    }
}

/// Run one LLM call under a deadline
pub(crate) async fn generate_within(
    llm: &dyn LlmBackend,
    request: GenerateRequest,
    timeout: Duration,
) -> Result<GenerateResponse, LlmError> {
    match tokio::time::timeout(timeout, llm.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout),
    }
}
