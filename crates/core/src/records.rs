//! Records created by the domain flows

use crate::contact::Gender;
use crate::ids::{generate_record_id, RecordPrefix};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Draft,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Confirmed" => Self::Confirmed,
            "Cancelled" => Self::Cancelled,
            "Completed" => Self::Completed,
            _ => Self::Draft,
        }
    }
}

/// Post-visit feedback attached to an appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub recommend: Option<bool>,
    #[serde(default)]
    pub comments: String,
    pub doctor_rating: Option<u8>,
    pub staff_rating: Option<u8>,
    pub facility_rating: Option<u8>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub organization_id: String,
    pub contact_phone: String,
    pub doctor_id: String,
    /// Unset when the referenced doctor is not on the tenant's roster
    pub doctor_name: Option<String>,
    pub patient_name: String,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<Gender>,
    pub specialty: String,
    pub date: String,
    pub time: String,
    pub reason: String,
    pub status: AppointmentStatus,
    pub flow_token: String,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// A draft appointment with a fresh `APT-` id
    pub fn draft(
        organization_id: impl Into<String>,
        contact_phone: impl Into<String>,
        flow_token: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_record_id(RecordPrefix::Appointment),
            organization_id: organization_id.into(),
            contact_phone: contact_phone.into(),
            doctor_id: String::new(),
            doctor_name: None,
            patient_name: String::new(),
            patient_age: None,
            patient_gender: None,
            specialty: String::new(),
            date: String::new(),
            time: String::new(),
            reason: String::new(),
            status: AppointmentStatus::Draft,
            flow_token: flow_token.into(),
            feedback: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: String,
    pub organization_id: String,
    pub contact_phone: String,
    pub description: String,
    pub urgency: String,
    pub category: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

impl SupportTicket {
    pub fn open(
        organization_id: impl Into<String>,
        contact_phone: impl Into<String>,
        description: impl Into<String>,
        urgency: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_record_id(RecordPrefix::Ticket),
            organization_id: organization_id.into(),
            contact_phone: contact_phone.into(),
            description: description.into(),
            urgency: urgency.into(),
            category: category.into(),
            status: TicketStatus::Open,
            created_at: Utc::now(),
        }
    }
}

/// Write-once record of a physical check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: String,
    pub organization_id: String,
    pub contact_phone: String,
    pub timestamp: DateTime<Utc>,
}

impl CheckIn {
    pub fn now(organization_id: impl Into<String>, contact_phone: impl Into<String>) -> Self {
        Self {
            id: generate_record_id(RecordPrefix::CheckIn),
            organization_id: organization_id.into(),
            contact_phone: contact_phone.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_appointment() {
        let apt = Appointment::draft("acme", "+1", "123456");
        assert!(apt.id.starts_with("APT-"));
        assert_eq!(apt.status, AppointmentStatus::Draft);
        assert!(apt.feedback.is_none());
    }

    #[test]
    fn test_ticket_opens() {
        let ticket = SupportTicket::open("acme", "+1", "Billing wrong", "High", "Billing");
        assert!(ticket.id.starts_with("TIC-"));
        assert_eq!(ticket.status.as_str(), "open");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AppointmentStatus::parse("Confirmed"), AppointmentStatus::Confirmed);
        assert_eq!(AppointmentStatus::parse("garbage"), AppointmentStatus::Draft);
    }
}
