//! Notification documents read by the tenant dashboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewContact,
    Appointment,
    SupportTicket,
    CheckIn,
    Feedback,
    Registration,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewContact => "new_contact",
            Self::Appointment => "appointment",
            Self::SupportTicket => "support_ticket",
            Self::CheckIn => "check_in",
            Self::Feedback => "feedback",
            Self::Registration => "registration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_contact" => Some(Self::NewContact),
            "appointment" => Some(Self::Appointment),
            "support_ticket" => Some(Self::SupportTicket),
            "check_in" => Some(Self::CheckIn),
            "feedback" => Some(Self::Feedback),
            "registration" => Some(Self::Registration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: String,
    pub from: String,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub seen: bool,
    /// Links to the triggering records (appointment id, ticket id, contact phone)
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(
        organization_id: impl Into<String>,
        kind: NotificationKind,
        from: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            from: from.into(),
            message: message.into(),
            kind,
            created_at: Utc::now(),
            seen: false,
            refs: BTreeMap::new(),
        }
    }

    pub fn with_ref(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.refs.insert(key.into(), value.into());
        self
    }
}
