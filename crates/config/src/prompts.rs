//! User-facing text and LLM prompt templates
//!
//! Templates interpolate `{org_name}` with the tenant display name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Seed system turn for every new conversation
    #[serde(default = "default_persona")]
    pub persona: String,

    /// small_talk reply
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Sent when the LLM is unavailable
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Sent when an intent's arguments cannot be decoded
    #[serde(default = "default_unrecognized_reply")]
    pub unrecognized_reply: String,

    #[serde(default = "default_media_ack")]
    pub media_ack: String,

    #[serde(default = "default_checkin_ack")]
    pub checkin_ack: String,

    #[serde(default = "default_knowledge_no_info")]
    pub knowledge_no_info: String,

    #[serde(default = "default_triage_disclaimer")]
    pub triage_disclaimer: String,

    #[serde(default = "default_triage_closing")]
    pub triage_closing: String,

    /// Plain-text welcome used when a tenant has no approved template
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
}

fn default_persona() -> String {
    "You are the WhatsApp assistant for {org_name}, a healthcare provider. \
     Be brief, warm and clear. Use the available functions to book appointments, \
     raise support tickets, answer questions about {org_name} and suggest the right \
     specialist for symptoms. Never give a diagnosis. If the user is just chatting, \
     call small_talk. Reply in the user's language."
        .to_string()
}

fn default_greeting() -> String {
    "Hello! Welcome to {org_name}. I can help you book an appointment, raise a support \
     request, answer questions about our services or suggest a specialist for your symptoms. \
     How can I help you today?"
        .to_string()
}

fn default_fallback_reply() -> String {
    "Sorry, I'm having trouble responding right now. Please try again in a moment.".to_string()
}

fn default_unrecognized_reply() -> String {
    "Sorry, I couldn't understand that request. Could you rephrase it?".to_string()
}

fn default_media_ack() -> String {
    "Thank you, we have received your file. Our team at {org_name} will review it.".to_string()
}

fn default_checkin_ack() -> String {
    "You are checked in at {org_name}. Please take a seat, we will call you shortly.".to_string()
}

fn default_knowledge_no_info() -> String {
    "Sorry, I couldn't find information about that for {org_name}. \
     Please contact the front desk for more details."
        .to_string()
}

fn default_triage_disclaimer() -> String {
    "Note: this is not a medical diagnosis. In an emergency please call your local emergency number."
        .to_string()
}

fn default_triage_closing() -> String {
    "Would you like me to book an appointment with one of these doctors?".to_string()
}

fn default_welcome_text() -> String {
    "Welcome to {org_name}! Send us a message any time to book an appointment or ask a question."
        .to_string()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            greeting: default_greeting(),
            fallback_reply: default_fallback_reply(),
            unrecognized_reply: default_unrecognized_reply(),
            media_ack: default_media_ack(),
            checkin_ack: default_checkin_ack(),
            knowledge_no_info: default_knowledge_no_info(),
            triage_disclaimer: default_triage_disclaimer(),
            triage_closing: default_triage_closing(),
            welcome_text: default_welcome_text(),
        }
    }
}

impl PromptsConfig {
    /// Interpolate the tenant display name into a template
    pub fn render(template: &str, org_name: &str) -> String {
        template.replace("{org_name}", org_name)
    }
}
