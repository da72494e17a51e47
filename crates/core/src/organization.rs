//! Tenant records

use serde::{Deserialize, Serialize};

/// Messaging credentials for the tenant's WhatsApp Business number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    /// Older documents stored the number id under a different field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_phone_number_id: Option<String>,
}

impl WhatsAppCredentials {
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.phone_number_id.trim().is_empty()
    }
}

/// WhatsApp flow ids used for interactive form prompts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

impl Doctor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, specialties: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Tenant identity and configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub whatsapp: WhatsAppCredentials,
    /// Billing flag; inactive tenants get no automated replies
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_url: Option<String>,
    /// File name (relative to the knowledge directory) used when no URL is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_file: Option<String>,
    #[serde(default)]
    pub flows: FlowIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_template: Option<String>,
    /// Persona prompt override; `{org_name}` is interpolated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_prompt: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
}

fn default_active() -> bool {
    true
}

impl Organization {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            whatsapp: WhatsAppCredentials::default(),
            active: true,
            knowledge_url: None,
            knowledge_file: None,
            flows: FlowIds::default(),
            welcome_template: None,
            persona_prompt: None,
            services: Vec::new(),
            doctors: Vec::new(),
        }
    }

    pub fn with_credentials(
        mut self,
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
    ) -> Self {
        self.whatsapp.access_token = access_token.into();
        self.whatsapp.phone_number_id = phone_number_id.into();
        self
    }

    pub fn with_doctor(mut self, doctor: Doctor) -> Self {
        self.doctors.push(doctor);
        self
    }

    pub fn doctor(&self, doctor_id: &str) -> Option<&Doctor> {
        self.doctors.iter().find(|d| d.id == doctor_id)
    }

    /// Matches either the current or the legacy phone-number-id field
    pub fn owns_phone_number_id(&self, phone_number_id: &str) -> bool {
        self.whatsapp.phone_number_id == phone_number_id
            || self.whatsapp.legacy_phone_number_id.as_deref() == Some(phone_number_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_defaults_from_json() {
        let org: Organization =
            serde_json::from_str(r#"{"id":"acme","name":"Acme Clinic"}"#).unwrap();
        assert!(org.active);
        assert!(org.doctors.is_empty());
        assert!(!org.whatsapp.is_complete());
    }

    #[test]
    fn test_phone_number_id_ownership() {
        let mut org = Organization::new("acme", "Acme").with_credentials("tok", "111");
        org.whatsapp.legacy_phone_number_id = Some("999".to_string());
        assert!(org.owns_phone_number_id("111"));
        assert!(org.owns_phone_number_id("999"));
        assert!(!org.owns_phone_number_id("222"));
    }

    #[test]
    fn test_doctor_lookup() {
        let org = Organization::new("acme", "Acme")
            .with_doctor(Doctor::new("d1", "Dr. Rao", &["Cardiologist"]));
        assert_eq!(org.doctor("d1").map(|d| d.name.as_str()), Some("Dr. Rao"));
        assert!(org.doctor("d2").is_none());
    }
}
