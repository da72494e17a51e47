//! Outbound messaging boundary
//!
//! The engine only ever talks to WhatsApp through [`Messenger`]. The server
//! provides the Graph API implementation; [`RecordingMessenger`] captures
//! messages in memory.

use async_trait::async_trait;
use careline_core::{MessageKind, Organization};
use parking_lot::Mutex;
use thiserror::Error;

/// First screen of every WhatsApp flow sent by the engine
pub const FLOW_ENTRY_SCREEN: &str = "screen_0";

#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Missing WhatsApp credentials for tenant {0}")]
    MissingCredentials(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    /// Pre-approved template with body parameters
    Template {
        name: String,
        language: String,
        parameters: Vec<String>,
    },
    /// Interactive flow prompt carrying a correlation token
    Flow {
        flow_id: String,
        flow_token: String,
        body: String,
        cta: String,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Template { .. } => MessageKind::Template,
            Self::Flow { .. } => MessageKind::Interactive,
        }
    }

    /// Text stored in the transcript for this message
    pub fn transcript_body(&self) -> String {
        match self {
            Self::Text(body) => body.clone(),
            Self::Template { name, .. } => format!("[template:{}]", name),
            Self::Flow { body, .. } => body.clone(),
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send one message to `to` using the tenant's credentials
    async fn send(
        &self,
        organization: &Organization,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<(), MessengerError>;
}

/// A message captured by [`RecordingMessenger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub organization_id: String,
    pub to: String,
    pub message: OutboundMessage,
}

/// Keeps every message in memory instead of sending it
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every send as if credentials were missing
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to == to)
            .map(|m| m.message.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        organization: &Organization,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<(), MessengerError> {
        if self.fail {
            return Err(MessengerError::MissingCredentials(organization.id.clone()));
        }
        self.sent.lock().push(SentMessage {
            organization_id: organization.id.clone(),
            to: to.to_string(),
            message: message.clone(),
        });
        Ok(())
    }
}
