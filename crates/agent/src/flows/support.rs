//! Support tickets

use careline_core::{Contact, Organization, SupportTicket};
use careline_persistence::TicketStore;
use careline_tools::{FormPayload, SupportForm};

use super::FlowOutcome;
use crate::messenger::OutboundMessage;
use crate::notify::NotificationEvent;
use crate::{metrics, AgentError};

/// Handle the `support_flow` intent
pub fn start(organization: &Organization, department: &str) -> FlowOutcome {
    let Some(flow_id) = &organization.flows.support else {
        tracing::warn!(tenant = %organization.id, "No support flow configured");
        return FlowOutcome::reply(format!(
            "Please call the {} front desk and our team will help you.",
            organization.name
        ));
    };

    let body = match department.trim() {
        "" => format!("Tell us what went wrong and the {} team will follow up.", organization.name),
        dept => format!("Tell us about your {} issue and the {} team will follow up.", dept, organization.name),
    };

    FlowOutcome::reply("I've sent you a support form. Please describe the issue and submit it.")
        .with_prompt(OutboundMessage::Flow {
            flow_id: flow_id.clone(),
            flow_token: careline_core::generate_flow_token(),
            body,
            cta: "Raise a request".to_string(),
        })
}

/// Open a ticket from a submitted support form
pub async fn submit(
    store: &dyn TicketStore,
    organization: &Organization,
    contact: &Contact,
    payload: &FormPayload,
) -> Result<FlowOutcome, AgentError> {
    let form = SupportForm::from(payload);
    let ticket = SupportTicket::open(
        &organization.id,
        &contact.phone,
        form.description,
        form.urgency,
        form.category,
    );
    store.create(&ticket).await?;
    metrics::record_created("ticket");
    tracing::info!(tenant = %organization.id, ticket_id = %ticket.id, "Support ticket opened");

    let reply = format!(
        "Your support request has been logged with reference {}. Our team will get back to you soon.",
        ticket.id
    );
    Ok(FlowOutcome::reply(reply).with_event(NotificationEvent::TicketOpened {
        phone: contact.phone.clone(),
        ticket_id: ticket.id,
        urgency: ticket.urgency,
        category: ticket.category,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::TicketStatus;
    use careline_persistence::InMemoryTicketStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_submit_opens_ticket() {
        let store = InMemoryTicketStore::new();
        let org = Organization::new("acme", "Acme Clinic");
        let contact = Contact::new("acme", "+1", "Priya");
        let payload = FormPayload::from_value(&json!({
            "screen_0_Description_of_issue_0": "Billed twice",
            "screen_0_Urgency_1": "1_High",
            "screen_0_Category_2": "0_Billing"
        }))
        .unwrap();

        let outcome = submit(&store, &org, &contact, &payload).await.unwrap();

        let tickets = store.list("acme").await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert!(tickets[0].id.starts_with("TIC-"));
        assert_eq!(tickets[0].status, TicketStatus::Open);
        assert_eq!(tickets[0].urgency, "High");
        assert_eq!(tickets[0].category, "Billing");
        assert!(outcome.reply.unwrap().contains(&tickets[0].id));
    }

    #[test]
    fn test_start_without_flow() {
        let org = Organization::new("acme", "Acme Clinic");
        let outcome = start(&org, "billing");
        assert!(outcome.prompts.is_empty());
        assert!(outcome.reply.unwrap().contains("Acme Clinic"));
    }

    #[test]
    fn test_start_with_flow() {
        let mut org = Organization::new("acme", "Acme Clinic");
        org.flows.support = Some("flow-sup".to_string());
        let outcome = start(&org, "billing");
        assert!(matches!(
            &outcome.prompts[0],
            OutboundMessage::Flow { body, .. } if body.contains("billing")
        ));
    }
}
