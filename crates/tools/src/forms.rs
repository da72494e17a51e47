//! Interactive form (`nfm_reply`) payloads
//!
//! WhatsApp flows return their answers as a JSON object whose keys embed the
//! screen and field index, e.g. `screen_0_Full_Name_0`. The label between
//! those indices decides which flow a submission belongs to.

use std::collections::BTreeMap;

use careline_core::{label_value, parse_rating, parse_yes_no, Feedback, Gender};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ToolsError;

static SCREEN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^screen_\d+_(.+?)_\d+$").expect("screen key pattern is valid"));

const FLOW_TOKEN_KEY: &str = "flow_token";

/// Field labels that identify each flow
pub mod labels {
    pub const FULL_NAME: &str = "Full_Name";
    pub const AGE: &str = "Age";
    pub const GENDER: &str = "Gender";
    pub const DATE_OF_BIRTH: &str = "Date_of_Birth";

    pub const CHOOSE: &str = "Choose";
    pub const COMMENTS: &str = "Comments";
    pub const DOCTOR_RATING: &str = "Doctor_Rating";
    pub const STAFF_RATING: &str = "Staff_Rating";
    pub const FACILITY_RATING: &str = "Facility_Rating";

    pub const DESCRIPTION_OF_ISSUE: &str = "Description_of_issue";
    pub const URGENCY: &str = "Urgency";
    pub const CATEGORY: &str = "Category";

    pub const PATIENT_NAME: &str = "Patient_Name";
    pub const DOCTOR: &str = "Doctor";
    pub const SPECIALTY: &str = "Specialty";
    pub const DATE: &str = "Date";
    pub const TIME: &str = "Time";
    pub const REASON: &str = "Reason";
}

/// Which flow a form submission belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Registration,
    Feedback,
    Support,
    Appointment,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Feedback => "feedback",
            Self::Support => "support",
            Self::Appointment => "appointment",
        }
    }
}

/// Label of a flow response key: `screen_0_Full_Name_0` → `Full_Name`
///
/// Keys without the screen decoration are returned unchanged.
pub fn field_label(key: &str) -> &str {
    SCREEN_KEY
        .captures(key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(key)
}

/// Decoded `response_json` of an interactive form reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    pub flow_token: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FormPayload {
    pub fn parse(response_json: &str) -> Result<Self, ToolsError> {
        let value: Value = serde_json::from_str(response_json)
            .map_err(|e| ToolsError::MalformedForm(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ToolsError> {
        let object = value
            .as_object()
            .ok_or_else(|| ToolsError::MalformedForm("expected a JSON object".to_string()))?;

        let mut payload = Self::default();
        for (key, value) in object {
            let text = value_text(value);
            if key == FLOW_TOKEN_KEY {
                payload.flow_token = Some(text).filter(|t| !t.is_empty());
                continue;
            }
            payload.fields.insert(field_label(key).to_string(), text);
        }
        Ok(payload)
    }

    /// First match wins: registration, feedback, support, then appointment
    pub fn kind(&self) -> FormKind {
        if self.has(labels::FULL_NAME) {
            FormKind::Registration
        } else if self.has(labels::CHOOSE) {
            FormKind::Feedback
        } else if self.has(labels::DESCRIPTION_OF_ISSUE) {
            FormKind::Support
        } else {
            FormKind::Appointment
        }
    }

    pub fn has(&self, label: &str) -> bool {
        self.fields.contains_key(label)
    }

    /// Trimmed value of a field, `None` when absent or blank
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .get(label)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn text(&self, label: &str) -> String {
        self.field(label).unwrap_or_default().to_string()
    }

    /// Label-decoded value (`"2_High"` → `"High"`)
    fn choice(&self, label: &str) -> String {
        self.field(label).map(label_value).unwrap_or_default().to_string()
    }

    fn number(&self, label: &str) -> Option<u32> {
        self.field(label).and_then(|v| label_value(v).parse().ok())
    }

    fn gender(&self) -> Option<Gender> {
        self.field(labels::GENDER).and_then(Gender::from_label)
    }

    fn rating(&self, label: &str) -> Option<u8> {
        let raw = self.field(label)?;
        match parse_rating(raw) {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::debug!(field = label, error = %e, "Unparseable rating");
                None
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentForm {
    pub patient_name: String,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<Gender>,
    pub doctor_id: String,
    pub specialty: String,
    pub date: String,
    pub time: String,
    pub reason: String,
}

impl From<&FormPayload> for AppointmentForm {
    fn from(form: &FormPayload) -> Self {
        Self {
            patient_name: form.text(labels::PATIENT_NAME),
            patient_age: form.number(labels::AGE),
            patient_gender: form.gender(),
            doctor_id: form.text(labels::DOCTOR),
            specialty: form.choice(labels::SPECIALTY),
            date: form.text(labels::DATE),
            time: form.text(labels::TIME),
            reason: form.text(labels::REASON),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportForm {
    pub description: String,
    pub urgency: String,
    pub category: String,
}

impl From<&FormPayload> for SupportForm {
    fn from(form: &FormPayload) -> Self {
        Self {
            description: form.text(labels::DESCRIPTION_OF_ISSUE),
            urgency: form.choice(labels::URGENCY),
            category: form.choice(labels::CATEGORY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackForm {
    pub recommend: Option<bool>,
    pub comments: String,
    pub doctor_rating: Option<u8>,
    pub staff_rating: Option<u8>,
    pub facility_rating: Option<u8>,
}

impl From<&FormPayload> for FeedbackForm {
    fn from(form: &FormPayload) -> Self {
        Self {
            recommend: form.field(labels::CHOOSE).and_then(parse_yes_no),
            comments: form.text(labels::COMMENTS),
            doctor_rating: form.rating(labels::DOCTOR_RATING),
            staff_rating: form.rating(labels::STAFF_RATING),
            facility_rating: form.rating(labels::FACILITY_RATING),
        }
    }
}

impl FeedbackForm {
    pub fn into_feedback(self, submitted_at: DateTime<Utc>) -> Feedback {
        Feedback {
            recommend: self.recommend,
            comments: self.comments,
            doctor_rating: self.doctor_rating,
            staff_rating: self.staff_rating,
            facility_rating: self.facility_rating,
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub full_name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<String>,
}

impl From<&FormPayload> for RegistrationForm {
    fn from(form: &FormPayload) -> Self {
        Self {
            full_name: form.text(labels::FULL_NAME),
            age: form.number(labels::AGE),
            gender: form.gender(),
            date_of_birth: form.field(labels::DATE_OF_BIRTH).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("screen_0_Full_Name_0"), "Full_Name");
        assert_eq!(field_label("screen_1_Description_of_issue_2"), "Description_of_issue");
        assert_eq!(field_label("Choose"), "Choose");
    }

    #[test]
    fn test_registration_wins_over_other_markers() {
        let payload = FormPayload::from_value(&json!({
            "screen_0_Choose_1": "0_Yes",
            "screen_0_Description_of_issue_2": "Billing",
            "screen_0_Full_Name_0": "Asha Rao",
            "flow_token": "111111"
        }))
        .unwrap();
        assert_eq!(payload.kind(), FormKind::Registration);
        assert_eq!(payload.flow_token.as_deref(), Some("111111"));
    }

    #[test]
    fn test_kind_order() {
        let feedback = FormPayload::from_value(&json!({
            "screen_0_Choose_0": "0_Yes",
            "screen_0_Description_of_issue_1": "x"
        }))
        .unwrap();
        assert_eq!(feedback.kind(), FormKind::Feedback);

        let support =
            FormPayload::from_value(&json!({"screen_0_Description_of_issue_0": "x"})).unwrap();
        assert_eq!(support.kind(), FormKind::Support);

        let appointment = FormPayload::from_value(&json!({"screen_0_Doctor_0": "d1"})).unwrap();
        assert_eq!(appointment.kind(), FormKind::Appointment);
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            FormPayload::parse("{oops"),
            Err(ToolsError::MalformedForm(_))
        ));
        assert!(FormPayload::parse("[1,2]").is_err());
    }

    #[test]
    fn test_appointment_form() {
        let payload = FormPayload::from_value(&json!({
            "screen_0_Patient_Name_0": " Ravi ",
            "screen_0_Age_1": "34",
            "screen_0_Gender_2": "0_Male",
            "screen_0_Doctor_3": "doc-7",
            "screen_0_Specialty_4": "1_Cardiologist",
            "screen_1_Date_0": "2024-05-01",
            "screen_1_Time_1": "10:30",
            "screen_1_Reason_2": "Chest pain",
            "flow_token": "424242"
        }))
        .unwrap();

        let form = AppointmentForm::from(&payload);
        assert_eq!(form.patient_name, "Ravi");
        assert_eq!(form.patient_age, Some(34));
        assert_eq!(form.patient_gender, Some(Gender::Male));
        assert_eq!(form.doctor_id, "doc-7");
        assert_eq!(form.specialty, "Cardiologist");
        assert_eq!(form.reason, "Chest pain");
    }

    #[test]
    fn test_support_form_label_values() {
        let payload = FormPayload::from_value(&json!({
            "screen_0_Description_of_issue_0": "Long wait at reception",
            "screen_0_Urgency_1": "2_High",
            "screen_0_Category_2": "1_Front_Desk"
        }))
        .unwrap();

        let form = SupportForm::from(&payload);
        assert_eq!(form.urgency, "High");
        assert_eq!(form.category, "Front_Desk");
    }

    #[test]
    fn test_feedback_form() {
        let payload = FormPayload::from_value(&json!({
            "screen_0_Choose_0": "0_Yes",
            "screen_0_Comments_1": "Very kind staff",
            "screen_0_Doctor_Rating_2": "0_★★★★★ (5/5)",
            "screen_0_Staff_Rating_3": "1_★★★★ (4/5)",
            "screen_0_Facility_Rating_4": "no stars",
            "flow_token": "123456"
        }))
        .unwrap();

        let form = FeedbackForm::from(&payload);
        assert_eq!(form.recommend, Some(true));
        assert_eq!(form.doctor_rating, Some(5));
        assert_eq!(form.staff_rating, Some(4));
        assert_eq!(form.facility_rating, None);

        let feedback = form.into_feedback(Utc::now());
        assert_eq!(feedback.comments, "Very kind staff");
    }

    #[test]
    fn test_registration_form() {
        let payload = FormPayload::from_value(&json!({
            "screen_0_Full_Name_0": "Asha Rao",
            "screen_0_Age_1": 29,
            "screen_0_Gender_2": "1_Female",
            "screen_0_Date_of_Birth_3": "1995-02-14"
        }))
        .unwrap();

        let form = RegistrationForm::from(&payload);
        assert_eq!(form.full_name, "Asha Rao");
        assert_eq!(form.age, Some(29));
        assert_eq!(form.gender, Some(Gender::Female));
        assert_eq!(form.date_of_birth.as_deref(), Some("1995-02-14"));
    }
}
