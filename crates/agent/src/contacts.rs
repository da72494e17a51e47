//! Contact sessions
//!
//! One contact per (tenant, phone). Creation is a conditional insert, so two
//! racing first messages still produce a single contact and a single welcome.

use std::sync::Arc;

use careline_config::PromptsConfig;
use careline_core::{ChatMessage, Contact, Direction, MessageKind, Organization};
use careline_persistence::ContactStore;
use chrono::Utc;

use crate::messenger::{Messenger, MessengerError, OutboundMessage};
use crate::notify::{NotificationEmitter, NotificationEvent};
use crate::{metrics, AgentError};

/// How new contacts are greeted
#[derive(Debug, Clone)]
pub struct WelcomeConfig {
    /// Template used when the tenant has none of its own
    pub default_template: Option<String>,
    pub language: String,
    /// Plain-text fallback, `{org_name}` interpolated
    pub text: String,
}

impl WelcomeConfig {
    pub fn message(&self, organization: &Organization, contact: &Contact) -> OutboundMessage {
        let template = organization
            .welcome_template
            .as_ref()
            .or(self.default_template.as_ref());

        match template {
            Some(name) => OutboundMessage::Template {
                name: name.clone(),
                language: self.language.clone(),
                parameters: vec![contact.name.clone()],
            },
            None => OutboundMessage::text(PromptsConfig::render(&self.text, &organization.name)),
        }
    }
}

pub struct ContactManager {
    store: Arc<dyn ContactStore>,
    messenger: Arc<dyn Messenger>,
    notifications: NotificationEmitter,
    welcome: WelcomeConfig,
}

impl ContactManager {
    pub fn new(
        store: Arc<dyn ContactStore>,
        messenger: Arc<dyn Messenger>,
        notifications: NotificationEmitter,
        welcome: WelcomeConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            notifications,
            welcome,
        }
    }

    /// Existing contact for (tenant, phone), or a new one greeted with the welcome message
    ///
    /// Returns the contact and whether this call created it.
    pub async fn get_or_create(
        &self,
        organization: &Organization,
        phone: &str,
        display_name: &str,
    ) -> Result<(Contact, bool), AgentError> {
        if let Some(mut contact) = self.store.get(&organization.id, phone).await? {
            contact.touch();
            if let Some(at) = contact.last_seen {
                self.store.touch(&organization.id, phone, at).await?;
            }
            return Ok((contact, false));
        }

        let name = match display_name.trim() {
            "" => phone,
            name => name,
        };
        let (mut contact, created) = self
            .store
            .create_if_absent(&Contact::new(&organization.id, phone, name))
            .await?;

        if !created {
            // lost the race to a concurrent first message
            contact.touch();
            return Ok((contact, false));
        }

        tracing::info!(tenant = %organization.id, phone = %phone, "New contact created");
        metrics::record_created("contact");

        self.notifications
            .emit_all(
                &organization.id,
                &[NotificationEvent::NewContact {
                    phone: phone.to_string(),
                    name: contact.name.clone(),
                }],
            )
            .await;

        let welcome = self.welcome.message(organization, &contact);
        self.send(organization, &mut contact, &welcome).await;

        Ok((contact, true))
    }

    /// Store one transcript entry, truncating the body, and bump last-seen
    #[allow(clippy::too_many_arguments)]
    pub async fn append_transcript(
        &self,
        contact: &mut Contact,
        direction: Direction,
        from: &str,
        to: &str,
        kind: MessageKind,
        body: &str,
        extra: Option<serde_json::Value>,
    ) -> Result<ChatMessage, AgentError> {
        let message = ChatMessage {
            organization_id: contact.organization_id.clone(),
            phone: contact.phone.clone(),
            direction,
            from: from.to_string(),
            to: to.to_string(),
            kind,
            body: careline_core::truncate_body(body),
            timestamp: Utc::now(),
            extra,
        };
        self.store.append_message(&message).await?;

        contact.last_seen = Some(message.timestamp);
        self.store
            .touch(&contact.organization_id, &contact.phone, message.timestamp)
            .await?;

        Ok(message)
    }

    /// Send to the contact and record the outbound turn; failures are logged
    pub async fn send(
        &self,
        organization: &Organization,
        contact: &mut Contact,
        message: &OutboundMessage,
    ) -> bool {
        match self.messenger.send(organization, &contact.phone, message).await {
            Ok(()) => {
                metrics::record_outbound(true);
                let from = organization.whatsapp.phone_number_id.clone();
                let to = contact.phone.clone();
                if let Err(e) = self
                    .append_transcript(
                        contact,
                        Direction::Outbound,
                        &from,
                        &to,
                        message.kind(),
                        &message.transcript_body(),
                        None,
                    )
                    .await
                {
                    tracing::warn!(tenant = %organization.id, error = %e, "Failed to store outbound transcript");
                }
                true
            }
            Err(e) => {
                metrics::record_outbound(false);
                match e {
                    MessengerError::MissingCredentials(_) => tracing::error!(
                        tenant = %organization.id,
                        "Outbound send skipped: WhatsApp credentials missing"
                    ),
                    other => tracing::warn!(
                        tenant = %organization.id,
                        phone = %contact.phone,
                        error = %other,
                        "Outbound send failed"
                    ),
                }
                false
            }
        }
    }

    /// Resend the welcome message to an existing contact
    pub async fn resend_welcome(
        &self,
        organization: &Organization,
        phone: &str,
    ) -> Result<bool, AgentError> {
        let Some(mut contact) = self.store.get(&organization.id, phone).await? else {
            return Ok(false);
        };
        let welcome = self.welcome.message(organization, &contact);
        Ok(self.send(organization, &mut contact, &welcome).await)
    }

    pub async fn save(&self, contact: &Contact) -> Result<(), AgentError> {
        Ok(self.store.save(contact).await?)
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::RecordingMessenger;
    use careline_core::TRUNCATION_MARKER;
    use careline_persistence::{InMemoryContactStore, InMemoryNotificationStore, NotificationStore};

    struct Fixture {
        manager: ContactManager,
        messenger: Arc<RecordingMessenger>,
        notifications: Arc<InMemoryNotificationStore>,
        contacts: Arc<InMemoryContactStore>,
    }

    fn fixture(default_template: Option<&str>) -> Fixture {
        let messenger = Arc::new(RecordingMessenger::new());
        let notifications = Arc::new(InMemoryNotificationStore::new());
        let contacts = Arc::new(InMemoryContactStore::new());
        let manager = ContactManager::new(
            contacts.clone(),
            messenger.clone(),
            NotificationEmitter::new(notifications.clone()),
            WelcomeConfig {
                default_template: default_template.map(str::to_string),
                language: "en".to_string(),
                text: PromptsConfig::default().welcome_text,
            },
        );
        Fixture {
            manager,
            messenger,
            notifications,
            contacts,
        }
    }

    fn org(id: &str) -> Organization {
        Organization::new(id, format!("{} Clinic", id)).with_credentials("token", format!("pn-{}", id))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let fx = fixture(Some("welcome_v1"));
        let acme = org("acme");

        let (first, created) = fx.manager.get_or_create(&acme, "+15550001", "Priya").await.unwrap();
        assert!(created);
        let (second, created_again) = fx.manager.get_or_create(&acme, "+15550001", "Priya").await.unwrap();
        assert!(!created_again);
        assert_eq!(first.phone, second.phone);
        assert_eq!(first.created_at, second.created_at);

        let sent = fx.messenger.sent_to("+15550001");
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], OutboundMessage::Template { name, .. } if name == "welcome_v1"));
        assert_eq!(fx.notifications.count_unseen("acme").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_phone_two_tenants_are_independent() {
        let fx = fixture(None);
        let (a, _) = fx.manager.get_or_create(&org("acme"), "+1", "Priya").await.unwrap();
        let (mut b, created) = fx.manager.get_or_create(&org("beta"), "+1", "Priya").await.unwrap();
        assert!(created);
        assert_ne!(a.organization_id, b.organization_id);

        b.registered = true;
        fx.manager.save(&b).await.unwrap();
        let a_stored = fx.contacts.get("acme", "+1").await.unwrap().unwrap();
        assert!(!a_stored.registered);

        // plain-text welcome when no template is configured
        assert!(matches!(&fx.messenger.sent()[0].message, OutboundMessage::Text(t) if t.contains("acme Clinic")));
    }

    #[tokio::test]
    async fn test_transcript_truncated() {
        let fx = fixture(None);
        let acme = org("acme");
        let (mut contact, _) = fx.manager.get_or_create(&acme, "+1", "").await.unwrap();
        assert_eq!(contact.name, "+1");

        let long = "x".repeat(350);
        let stored = fx
            .manager
            .append_transcript(&mut contact, Direction::Inbound, "+1", "pn-acme", MessageKind::Text, &long, None)
            .await
            .unwrap();
        assert_eq!(stored.body, format!("{}{}", "x".repeat(300), TRUNCATION_MARKER));

        let exact = "y".repeat(300);
        let stored = fx
            .manager
            .append_transcript(&mut contact, Direction::Inbound, "+1", "pn-acme", MessageKind::Text, &exact, None)
            .await
            .unwrap();
        assert_eq!(stored.body, exact);
    }

    #[tokio::test]
    async fn test_send_failure_is_not_fatal() {
        let contacts = Arc::new(InMemoryContactStore::new());
        let manager = ContactManager::new(
            contacts.clone(),
            Arc::new(RecordingMessenger::failing()),
            NotificationEmitter::new(Arc::new(InMemoryNotificationStore::new())),
            WelcomeConfig {
                default_template: None,
                language: "en".to_string(),
                text: "hi".to_string(),
            },
        );

        let (contact, created) = manager.get_or_create(&org("acme"), "+1", "A").await.unwrap();
        assert!(created);
        assert!(contacts.messages("acme", &contact.phone, 10).await.unwrap().is_empty());
    }
}
