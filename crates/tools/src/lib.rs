//! Intent catalog and form decoding
//!
//! The LLM picks from a fixed catalog of five intents. Its structured output is
//! decoded into the closed [`Intent`] union, validated against each intent's
//! JSON Schema; anything that does not fit becomes [`Intent::Unrecognized`].
//!
//! Interactive form replies (`nfm_reply`) are decoded by [`FormPayload`] and
//! classified into a [`FormKind`] by their labelled fields.

pub mod catalog;
pub mod forms;
pub mod intent;

pub use catalog::{names, IntentCatalog};
pub use forms::{
    field_label, AppointmentForm, FeedbackForm, FormKind, FormPayload, RegistrationForm,
    SupportForm,
};
pub use intent::{AppointmentAction, Intent};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("Invalid schema for {tool}: {message}")]
    Schema { tool: String, message: String },

    #[error("Malformed form payload: {0}")]
    MalformedForm(String),
}
