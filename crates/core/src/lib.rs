//! Core records and types for the careline chatbot
//!
//! This crate provides foundational types used across all other crates:
//! - Tenant records (organizations, doctors) and per-tenant conversation records
//! - LLM request/response and tool-calling wire types
//! - The cache abstraction shared by tenant and knowledge lookups
//! - Record id / flow token generation and form label decoders
//! - Error types

pub mod cache;
pub mod contact;
pub mod error;
pub mod ids;
pub mod labels;
pub mod llm_types;
pub mod notification;
pub mod organization;
pub mod records;
pub mod transcript;

pub use cache::{Cache, ExpiryPolicy, MemoryCache};
pub use contact::{Contact, Gender, Patient, Relation};
pub use error::{Error, Result};
pub use ids::{generate_flow_token, generate_record_id, RecordPrefix};
pub use labels::{label_value, parse_rating, parse_yes_no};
pub use llm_types::{
    FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage, ToolCall,
    ToolDefinition,
};
pub use notification::{Notification, NotificationKind};
pub use organization::{Doctor, FlowIds, Organization, WhatsAppCredentials};
pub use records::{Appointment, AppointmentStatus, CheckIn, Feedback, SupportTicket, TicketStatus};
pub use transcript::{truncate_body, ChatMessage, Direction, MessageKind, TRUNCATION_MARKER};
