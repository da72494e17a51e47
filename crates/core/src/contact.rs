//! Contacts (one per phone number per organization) and their patients

use crate::labels::label_value;
use crate::llm_types::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Decode an indexed form label such as `"0_Male"`
    pub fn from_label(raw: &str) -> Option<Self> {
        match label_value(raw).to_ascii_lowercase().as_str() {
            "" => None,
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => Some(Self::Other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

/// Patient relation to the contact that owns the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "Self")]
    SelfRelation,
    Other,
}

impl Relation {
    /// `Self` when the patient name equals the contact name, ignoring case
    pub fn between(patient_name: &str, contact_name: &str) -> Self {
        if patient_name.trim().eq_ignore_ascii_case(contact_name.trim()) {
            Self::SelfRelation
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub relation: Relation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
}

impl Patient {
    pub fn new(name: impl Into<String>, relation: Relation) -> Self {
        Self {
            name: name.into(),
            age: None,
            gender: None,
            relation,
            date_of_birth: None,
        }
    }
}

/// Conversational identity for a (phone, organization) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub organization_id: String,
    pub phone: String,
    pub name: String,
    pub bot_enabled: bool,
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Conversation turns fed to the LLM, append-only
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl Contact {
    /// A fresh contact with bot mode on and a default self patient
    pub fn new(
        organization_id: impl Into<String>,
        phone: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let name = display_name.into();
        let now = Utc::now();
        // The relation check compares the display name with itself, so the
        // default patient is always Self. Kept until the intended comparison
        // is confirmed.
        let relation = Relation::between(&name, &name);
        Self {
            organization_id: organization_id.into(),
            phone: phone.into(),
            patients: vec![Patient::new(name.clone(), relation)],
            name,
            bot_enabled: true,
            registered: false,
            last_seen: Some(now),
            created_at: now,
            history: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Some(Utc::now());
    }

    pub fn has_patient(&self, name: &str) -> bool {
        self.patients.iter().any(|p| p.name == name)
    }

    pub fn self_patient_mut(&mut self) -> Option<&mut Patient> {
        self.patients
            .iter_mut()
            .find(|p| p.relation == Relation::SelfRelation)
    }

    /// Seeds the persona prompt unless a system turn already exists
    pub fn ensure_system_turn(&mut self, prompt: impl Into<String>) -> bool {
        if self.history.iter().any(|m| m.role == Role::System) {
            return false;
        }
        self.history.insert(0, Message::system(prompt));
        true
    }

    /// System turn plus the most recent `max_turns` non-system turns
    pub fn recent_history(&self, max_turns: usize) -> Vec<Message> {
        let system = self.history.iter().filter(|m| m.role == Role::System).take(1);
        let rest: Vec<&Message> = self.history.iter().filter(|m| m.role != Role::System).collect();
        let skip = rest.len().saturating_sub(max_turns);
        system.chain(rest.into_iter().skip(skip)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contact_defaults() {
        let contact = Contact::new("acme", "+15550001", "Priya");
        assert!(contact.bot_enabled);
        assert!(!contact.registered);
        assert!(contact.last_seen.is_some());
        assert_eq!(contact.patients.len(), 1);
        assert_eq!(contact.patients[0].relation, Relation::SelfRelation);
        assert_eq!(contact.patients[0].name, "Priya");
    }

    #[test]
    fn test_relation_between() {
        assert_eq!(Relation::between("PRIYA ", "priya"), Relation::SelfRelation);
        assert_eq!(Relation::between("Arjun", "Priya"), Relation::Other);
    }

    #[test]
    fn test_gender_from_label() {
        assert_eq!(Gender::from_label("0_Male"), Some(Gender::Male));
        assert_eq!(Gender::from_label("1_Female"), Some(Gender::Female));
        assert_eq!(Gender::from_label("2_Prefer not to say"), Some(Gender::Other));
        assert_eq!(Gender::from_label(""), None);
    }

    #[test]
    fn test_system_turn_seeded_once() {
        let mut contact = Contact::new("acme", "+1", "A");
        assert!(contact.ensure_system_turn("persona"));
        contact.history.push(Message::user("hi"));
        assert!(!contact.ensure_system_turn("persona again"));
        assert_eq!(
            contact.history.iter().filter(|m| m.role == Role::System).count(),
            1
        );
    }

    #[test]
    fn test_recent_history_keeps_system_turn() {
        let mut contact = Contact::new("acme", "+1", "A");
        contact.ensure_system_turn("persona");
        for i in 0..10 {
            contact.history.push(Message::user(format!("m{}", i)));
        }
        let recent = contact.recent_history(3);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].role, Role::System);
        assert_eq!(recent[3].content, "m9");
    }

    #[test]
    fn test_relation_serializes_as_self() {
        let json = serde_json::to_string(&Relation::SelfRelation).unwrap();
        assert_eq!(json, "\"Self\"");
    }
}
