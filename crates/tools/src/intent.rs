//! Closed set of intents the model can select

use serde::Deserialize;
use serde_json::Value;

use crate::catalog::names;

/// What the user asked for with an appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentAction {
    New,
    Reschedule,
    Cancel,
    Unknown(String),
}

impl AppointmentAction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" | "book" => Self::New,
            "reschedule" => Self::Reschedule,
            "cancel" => Self::Cancel,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A decoded intent with typed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AppointmentFlow { action: AppointmentAction },
    SupportFlow { department: String },
    KnowledgeLookup { query: String },
    SmallTalk { message: String },
    SymptomAssessment { symptoms: String },
    /// Model output that names no known intent or carries invalid arguments
    Unrecognized { name: String, reason: String },
}

#[derive(Deserialize)]
struct ActionArgs {
    action: String,
}

#[derive(Deserialize)]
struct DepartmentArgs {
    #[serde(default)]
    department: String,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct MessageArgs {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct SymptomArgs {
    symptoms: String,
}

impl Intent {
    pub(crate) fn unrecognized(name: &str, reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Build from already-validated arguments
    pub(crate) fn from_arguments(name: &str, arguments: Value) -> Self {
        let decoded = match name {
            names::APPOINTMENT_FLOW => serde_json::from_value::<ActionArgs>(arguments).map(|a| {
                Self::AppointmentFlow {
                    action: AppointmentAction::parse(&a.action),
                }
            }),
            names::SUPPORT_FLOW => serde_json::from_value::<DepartmentArgs>(arguments)
                .map(|a| Self::SupportFlow {
                    department: a.department,
                }),
            names::KNOWLEDGE_LOOKUP => serde_json::from_value::<QueryArgs>(arguments)
                .map(|a| Self::KnowledgeLookup { query: a.query }),
            names::SMALL_TALK => serde_json::from_value::<MessageArgs>(arguments)
                .map(|a| Self::SmallTalk { message: a.message }),
            names::SYMPTOM_ASSESSMENT => serde_json::from_value::<SymptomArgs>(arguments)
                .map(|a| Self::SymptomAssessment {
                    symptoms: a.symptoms,
                }),
            other => return Self::unrecognized(other, "unknown intent"),
        };

        decoded.unwrap_or_else(|e| Self::unrecognized(name, e.to_string()))
    }

    /// Intent name used for logging and metrics labels
    pub fn name(&self) -> &str {
        match self {
            Self::AppointmentFlow { .. } => names::APPOINTMENT_FLOW,
            Self::SupportFlow { .. } => names::SUPPORT_FLOW,
            Self::KnowledgeLookup { .. } => names::KNOWLEDGE_LOOKUP,
            Self::SmallTalk { .. } => names::SMALL_TALK,
            Self::SymptomAssessment { .. } => names::SYMPTOM_ASSESSMENT,
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}
