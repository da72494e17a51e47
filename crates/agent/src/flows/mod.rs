//! Domain flow handlers
//!
//! Handlers persist their primary record and describe everything else in a
//! [`FlowOutcome`]: the reply text, extra outbound prompts, and notification
//! events. The engine sends and emits those after the handler returns.
//! Storage failures never reach the user; they degrade to the fallback reply.

pub mod appointment;
pub mod checkin;
pub mod feedback;
pub mod registration;
pub mod small_talk;
pub mod support;

use std::sync::Arc;

use careline_config::PromptsConfig;
use careline_core::{Contact, Organization};
use careline_persistence::PersistenceLayer;
use careline_tools::{FormKind, FormPayload, Intent};

use crate::knowledge::KnowledgeStore;
use crate::messenger::OutboundMessage;
use crate::notify::NotificationEvent;
use crate::triage::Triage;
use crate::AgentError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowOutcome {
    /// Text reply to the contact; `None` sends nothing
    pub reply: Option<String>,
    /// Sent before the reply
    pub prompts: Vec<OutboundMessage>,
    pub events: Vec<NotificationEvent>,
}

impl FlowOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: OutboundMessage) -> Self {
        self.prompts.push(prompt);
        self
    }

    pub fn with_event(mut self, event: NotificationEvent) -> Self {
        self.events.push(event);
        self
    }
}

pub struct FlowHandlers {
    stores: PersistenceLayer,
    knowledge: Arc<KnowledgeStore>,
    triage: Triage,
    prompts: PromptsConfig,
}

impl FlowHandlers {
    pub fn new(
        stores: PersistenceLayer,
        knowledge: Arc<KnowledgeStore>,
        triage: Triage,
        prompts: PromptsConfig,
    ) -> Self {
        Self {
            stores,
            knowledge,
            triage,
            prompts,
        }
    }

    /// Run an intent chosen by the router
    pub async fn run_intent(
        &self,
        organization: &Organization,
        contact: &mut Contact,
        intent: &Intent,
    ) -> FlowOutcome {
        match intent {
            Intent::AppointmentFlow { action } => appointment::start(organization, action),
            Intent::SupportFlow { department } => support::start(organization, department),
            Intent::KnowledgeLookup { query } => FlowOutcome::reply(
                self.knowledge
                    .lookup(organization, query, &self.prompts)
                    .await,
            ),
            Intent::SmallTalk { .. } => {
                FlowOutcome::reply(small_talk::reply(organization, &self.prompts))
            }
            Intent::SymptomAssessment { symptoms } => FlowOutcome::reply(
                self.triage
                    .assess(organization, symptoms, &self.prompts)
                    .await,
            ),
            Intent::Unrecognized { name, reason } => {
                tracing::info!(
                    tenant = %organization.id,
                    phone = %contact.phone,
                    intent = %name,
                    %reason,
                    "Unrecognized intent"
                );
                FlowOutcome::reply(self.prompts.unrecognized_reply.clone())
            }
        }
    }

    /// Route an interactive form submission to its flow
    pub async fn submit_form(
        &self,
        organization: &Organization,
        contact: &mut Contact,
        payload: &FormPayload,
    ) -> FlowOutcome {
        let kind = payload.kind();
        tracing::info!(
            tenant = %organization.id,
            phone = %contact.phone,
            form = kind.as_str(),
            "Form submission"
        );

        let result = match kind {
            FormKind::Registration => registration::submit(organization, contact, payload),
            FormKind::Feedback => {
                feedback::submit(self.stores.appointments.as_ref(), organization, contact, payload)
                    .await
            }
            FormKind::Support => {
                support::submit(self.stores.tickets.as_ref(), organization, contact, payload).await
            }
            FormKind::Appointment => {
                appointment::submit(self.stores.appointments.as_ref(), organization, contact, payload)
                    .await
            }
        };
        self.degrade(organization, kind.as_str(), result)
    }

    /// `Checkin:<tenant>` shortcut
    pub async fn check_in(&self, organization: &Organization, contact: &Contact) -> FlowOutcome {
        let result = checkin::create(
            self.stores.checkins.as_ref(),
            organization,
            contact,
            &self.prompts,
        )
        .await;
        self.degrade(organization, "checkin", result)
    }

    fn degrade(
        &self,
        organization: &Organization,
        flow: &str,
        result: Result<FlowOutcome, AgentError>,
    ) -> FlowOutcome {
        result.unwrap_or_else(|e| {
            tracing::error!(tenant = %organization.id, flow, error = %e, "Flow failed");
            FlowOutcome::reply(self.prompts.fallback_reply.clone())
        })
    }

    pub fn prompts(&self) -> &PromptsConfig {
        &self.prompts
    }
}
