//! Symptom triage
//!
//! Each symptom fragment is classified into one specialty from a closed list,
//! then matched against the tenant's doctors with [`crate::fuzzy`].

use std::sync::Arc;
use std::time::Duration;

use careline_config::PromptsConfig;
use careline_core::{Doctor, GenerateRequest, Organization};
use careline_llm::LlmBackend;

use crate::fuzzy::{normalize, specialty_matches};
use crate::generate_within;

pub const DEFAULT_SPECIALTY: &str = "General Physician";

pub const SPECIALTIES: &[&str] = &[
    "General Physician",
    "Cardiologist",
    "Dermatologist",
    "Neurologist",
    "Orthopedic Surgeon",
    "Pediatrician",
    "Gynecologist",
    "Obstetrician",
    "Ophthalmologist",
    "ENT Specialist",
    "Dentist",
    "Psychiatrist",
    "Psychologist",
    "Endocrinologist",
    "Gastroenterologist",
    "Hepatologist",
    "Pulmonologist",
    "Nephrologist",
    "Urologist",
    "Oncologist",
    "Hematologist",
    "Rheumatologist",
    "Allergist",
    "Immunologist",
    "Infectious Disease Specialist",
    "General Surgeon",
    "Neurosurgeon",
    "Cardiothoracic Surgeon",
    "Plastic Surgeon",
    "Vascular Surgeon",
    "Colorectal Surgeon",
    "Bariatric Surgeon",
    "Anesthesiologist",
    "Radiologist",
    "Pathologist",
    "Physiotherapist",
    "Sports Medicine Specialist",
    "Pain Management Specialist",
    "Geriatrician",
    "Neonatologist",
    "Diabetologist",
    "Dietitian",
    "Sleep Medicine Specialist",
    "Emergency Medicine Specialist",
    "Family Medicine Physician",
    "Internal Medicine Specialist",
    "Podiatrist",
    "Audiologist",
    "Speech Therapist",
    "Andrologist",
    "Fertility Specialist",
    "Occupational Therapist",
];

/// Map model output onto the closed specialty list
pub fn coerce_specialty(raw: &str) -> &'static str {
    let wanted = normalize(raw);
    SPECIALTIES
        .iter()
        .find(|s| s.to_lowercase() == wanted)
        .copied()
        .unwrap_or(DEFAULT_SPECIALTY)
}

/// Split free text into sentence-ish fragments on `.`, `,` and newlines
pub fn split_fragments(text: &str) -> Vec<&str> {
    text.split(&['.', ',', '\n'][..])
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

/// Doctors with at least one specialty matching `specialty`
pub fn find_doctors<'a>(organization: &'a Organization, specialty: &str) -> Vec<&'a Doctor> {
    organization
        .doctors
        .iter()
        .filter(|d| d.specialties.iter().any(|s| specialty_matches(s, specialty)))
        .collect()
}

pub struct Triage {
    llm: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl Triage {
    pub fn new(llm: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// One specialty for a symptom description; falls back to [`DEFAULT_SPECIALTY`]
    pub async fn classify(&self, symptom_text: &str) -> &'static str {
        let system = format!(
            "You map patient symptoms to a medical specialty. Reply with exactly one \
             specialty from this list and nothing else: {}",
            SPECIALTIES.join(", ")
        );
        let request = GenerateRequest::new(system)
            .with_user_message(symptom_text)
            .with_temperature(0.0)
            .with_max_tokens(16);

        match generate_within(self.llm.as_ref(), request, self.timeout).await {
            Ok(response) => coerce_specialty(&response.text),
            Err(e) => {
                tracing::warn!(error = %e, "Specialty classification failed");
                DEFAULT_SPECIALTY
            }
        }
    }

    /// Suggestion per fragment followed by the disclaimer and closing prompt
    pub async fn assess(
        &self,
        organization: &Organization,
        symptoms: &str,
        prompts: &PromptsConfig,
    ) -> String {
        let mut sections = Vec::new();

        for fragment in split_fragments(symptoms) {
            let specialty = self.classify(fragment).await;
            let doctors = find_doctors(organization, specialty);
            tracing::debug!(
                tenant = %organization.id,
                specialty,
                doctors = doctors.len(),
                "Triage fragment classified"
            );

            let mut section = format!("For \"{}\" we suggest a {}.", fragment, specialty);
            if doctors.is_empty() {
                section.push_str(&format!(
                    " No {} is listed at {} right now; our front desk can help.",
                    specialty, organization.name
                ));
            } else {
                let names: Vec<&str> = doctors.iter().map(|d| d.name.as_str()).collect();
                section.push_str(&format!(" Available: {}.", names.join(", ")));
            }
            sections.push(section);
        }

        if sections.is_empty() {
            sections.push("Please describe your symptoms so I can suggest a specialist.".to_string());
        }

        format!(
            "{}\n\n{}\n{}",
            sections.join("\n"),
            PromptsConfig::render(&prompts.triage_disclaimer, &organization.name),
            PromptsConfig::render(&prompts.triage_closing, &organization.name)
        )
    }
}
