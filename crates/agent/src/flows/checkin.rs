//! Physical check-in via the `Checkin:<tenant>` text command

use careline_config::PromptsConfig;
use careline_core::{CheckIn, Contact, Organization};
use careline_persistence::CheckInStore;

use super::FlowOutcome;
use crate::notify::NotificationEvent;
use crate::{metrics, AgentError};

pub const COMMAND_PREFIX: &str = "Checkin:";

/// True when `text` is `Checkin:` followed by exactly this tenant's id
pub fn is_command(text: &str, tenant_id: &str) -> bool {
    text.trim().strip_prefix(COMMAND_PREFIX) == Some(tenant_id)
}

pub async fn create(
    store: &dyn CheckInStore,
    organization: &Organization,
    contact: &Contact,
    prompts: &PromptsConfig,
) -> Result<FlowOutcome, AgentError> {
    let checkin = CheckIn::now(&organization.id, &contact.phone);
    store.create(&checkin).await?;
    metrics::record_created("checkin");
    tracing::info!(tenant = %organization.id, checkin_id = %checkin.id, "Check-in recorded");

    Ok(
        FlowOutcome::reply(PromptsConfig::render(&prompts.checkin_ack, &organization.name))
            .with_event(NotificationEvent::CheckedIn {
                phone: contact.phone.clone(),
                checkin_id: checkin.id,
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_persistence::InMemoryCheckInStore;

    #[test]
    fn test_is_command() {
        assert!(is_command("Checkin:Acme", "Acme"));
        assert!(is_command(" Checkin:Acme\n", "Acme"));
        assert!(!is_command("Checkin:Acme", "Other"));
        assert!(!is_command("Checkin:acme", "Acme"));
        assert!(!is_command("checkin:Acme", "Acme"));
        assert!(!is_command("Checkin: Acme", "Acme"));
    }

    #[tokio::test]
    async fn test_create_records_and_notifies() {
        let store = InMemoryCheckInStore::new();
        let org = Organization::new("Acme", "Acme Clinic");
        let contact = Contact::new("Acme", "+1", "Priya");

        let outcome = create(&store, &org, &contact, &PromptsConfig::default())
            .await
            .unwrap();

        let stored = store.list("Acme").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].id.starts_with("CHK-"));
        assert!(outcome.reply.unwrap().contains("Acme Clinic"));
        assert_eq!(outcome.events.len(), 1);
    }
}
