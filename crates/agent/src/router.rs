//! Intent routing over the LLM function-calling interface
//!
//! Each inbound text becomes a user turn. The model sees the contact's recent
//! history plus the intent catalog and either picks one intent or answers in
//! plain text. Turns are only ever appended.

use std::sync::Arc;
use std::time::Duration;

use careline_config::PromptsConfig;
use careline_core::{Contact, GenerateRequest, Message, Organization};
use careline_llm::LlmBackend;
use careline_tools::{Intent, IntentCatalog};
use serde_json::Value;

use crate::flows::{FlowHandlers, FlowOutcome};
use crate::{generate_within, metrics};

/// What the model decided for one user turn
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Intent(Intent),
    Reply(String),
    /// LLM unavailable or returned nothing usable
    Failed,
}

pub struct IntentRouter {
    llm: Arc<dyn LlmBackend>,
    catalog: IntentCatalog,
    max_history_turns: usize,
    timeout: Duration,
}

impl IntentRouter {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        catalog: IntentCatalog,
        max_history_turns: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            catalog,
            max_history_turns,
            timeout,
        }
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    /// Ask the model for a decision on the contact's latest turn
    pub async fn route(&self, contact: &Contact) -> RouteDecision {
        let request = GenerateRequest::from_messages(contact.recent_history(self.max_history_turns))
            .with_tools(self.catalog.tools().to_vec());

        let response = match generate_within(self.llm.as_ref(), request, self.timeout).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    tenant = %contact.organization_id,
                    phone = %contact.phone,
                    error = %e,
                    "Intent routing failed"
                );
                return RouteDecision::Failed;
            }
        };

        if let Some(call) = response.tool_calls.first() {
            if response.tool_calls.len() > 1 {
                tracing::debug!(
                    count = response.tool_calls.len(),
                    "Model chose several intents, using the first"
                );
            }
            return RouteDecision::Intent(self.catalog.decode(call));
        }

        match response.text.trim() {
            "" => RouteDecision::Failed,
            text => RouteDecision::Reply(text.to_string()),
        }
    }

    /// Handle one free-text message end to end
    ///
    /// Appends the user turn, routes it, runs the chosen flow and appends the
    /// visible answer as an assistant turn. The caller persists the contact.
    pub async fn converse(
        &self,
        organization: &Organization,
        contact: &mut Contact,
        text: &str,
        flows: &FlowHandlers,
    ) -> FlowOutcome {
        let prompts = flows.prompts();
        contact.ensure_system_turn(persona(organization, prompts));
        contact.history.push(Message::user(text));

        match self.route(contact).await {
            RouteDecision::Intent(intent) => {
                metrics::record_intent(intent.name());
                tracing::info!(
                    tenant = %organization.id,
                    phone = %contact.phone,
                    intent = intent.name(),
                    "Intent selected"
                );
                let outcome = flows.run_intent(organization, contact, &intent).await;
                if let Some(reply) = &outcome.reply {
                    contact.history.push(Message::assistant(reply.clone()));
                }
                outcome
            }
            RouteDecision::Reply(raw) => {
                let reply = unwrap_reply(&raw);
                contact.history.push(Message::assistant(reply.clone()));
                FlowOutcome::reply(reply)
            }
            RouteDecision::Failed => FlowOutcome::reply(prompts.fallback_reply.clone()),
        }
    }
}

fn persona(organization: &Organization, prompts: &PromptsConfig) -> String {
    let template = organization
        .persona_prompt
        .as_deref()
        .unwrap_or(&prompts.persona);
    PromptsConfig::render(template, &organization.name)
}

/// Models sometimes echo `{"reply": "..."}` instead of plain text
pub fn unwrap_reply(text: &str) -> String {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => match map.get("reply") {
            Some(Value::String(reply)) => reply.clone(),
            _ => text.to_string(),
        },
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::{Role, ToolCall};
    use careline_llm::{LlmError, ScriptedBackend};

    fn router(llm: Arc<ScriptedBackend>) -> IntentRouter {
        IntentRouter::new(llm, IntentCatalog::new().unwrap(), 4, Duration::from_secs(5))
    }

    #[test]
    fn test_unwrap_reply() {
        assert_eq!(unwrap_reply(r#"{"reply": "Hi there"}"#), "Hi there");
        assert_eq!(unwrap_reply("plain text"), "plain text");
        assert_eq!(unwrap_reply(r#"{"answer": "x"}"#), r#"{"answer": "x"}"#);
        assert_eq!(unwrap_reply(r#"{"reply": 3}"#), r#"{"reply": 3}"#);
    }

    #[tokio::test]
    async fn test_route_decodes_first_tool_call() {
        let llm = Arc::new(ScriptedBackend::new());
        llm.push(Ok(careline_core::GenerateResponse::tool_call(ToolCall::new(
            "call_1",
            "knowledge_lookup",
            r#"{"query":"visiting hours"}"#,
        ))));
        let router = router(llm.clone());
        let mut contact = Contact::new("acme", "+1", "Priya");
        contact.history.push(Message::user("when can I visit?"));

        let decision = router.route(&contact).await;
        assert_eq!(
            decision,
            RouteDecision::Intent(Intent::KnowledgeLookup {
                query: "visiting hours".to_string()
            })
        );
        assert_eq!(llm.requests()[0].tools.len(), 5);
    }

    #[tokio::test]
    async fn test_route_bad_arguments_are_unrecognized() {
        let llm = Arc::new(ScriptedBackend::new());
        llm.push(Ok(careline_core::GenerateResponse::tool_call(ToolCall::new(
            "call_1",
            "symptom_assessment",
            "{not json",
        ))));
        let router = router(llm);
        let contact = Contact::new("acme", "+1", "Priya");

        assert!(matches!(
            router.route(&contact).await,
            RouteDecision::Intent(Intent::Unrecognized { .. })
        ));
    }

    #[tokio::test]
    async fn test_route_failure() {
        let llm = Arc::new(ScriptedBackend::new());
        llm.push(Err(LlmError::Network("down".to_string())));
        llm.push(Ok(careline_core::GenerateResponse::text("   ")));
        let router = router(llm);
        let contact = Contact::new("acme", "+1", "Priya");

        assert_eq!(router.route(&contact).await, RouteDecision::Failed);
        assert_eq!(router.route(&contact).await, RouteDecision::Failed);
    }

    #[tokio::test]
    async fn test_history_window_keeps_system_turn() {
        let llm = Arc::new(ScriptedBackend::new());
        let router = router(llm.clone());
        let mut contact = Contact::new("acme", "+1", "Priya");
        contact.ensure_system_turn("persona");
        for i in 0..10 {
            contact.history.push(Message::user(format!("turn {}", i)));
        }

        router.route(&contact).await;

        let sent = &llm.requests()[0].messages;
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[4].content, "turn 9");
    }
}
