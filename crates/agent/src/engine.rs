//! Inbound event processing
//!
//! The engine resolves the tenant for a webhook event, then handles each
//! message under a per-(tenant, phone) lock so turns for one contact are
//! processed strictly in arrival order. Different contacts run concurrently.

use std::sync::Arc;
use std::time::Duration;

use careline_config::{PromptsConfig, Settings};
use careline_core::{Cache, Contact, Direction, ExpiryPolicy, MemoryCache, MessageKind, Organization};
use careline_llm::LlmBackend;
use careline_persistence::PersistenceLayer;
use careline_tools::{FormPayload, IntentCatalog};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::contacts::{ContactManager, WelcomeConfig};
use crate::flows::{checkin, FlowHandlers, FlowOutcome};
use crate::knowledge::KnowledgeStore;
use crate::messenger::{Messenger, OutboundMessage};
use crate::notify::NotificationEmitter;
use crate::router::IntentRouter;
use crate::tenant::{TenantRequest, TenantResolver};
use crate::triage::Triage;
use crate::AgentError;

/// One webhook delivery, already decoded from the provider envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub tenant: TenantRequest,
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    pub profile_name: Option<String>,
    pub content: InboundContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    /// Interactive flow submission (`nfm_reply`)
    FormReply { response_json: String },
    Media {
        kind: MessageKind,
        caption: Option<String>,
        media_id: Option<String>,
    },
    /// Provider message type we do not handle
    Unsupported(String),
}

impl InboundContent {
    fn transcript(&self) -> (MessageKind, String, Option<serde_json::Value>) {
        match self {
            Self::Text(text) => (MessageKind::Text, text.clone(), None),
            Self::FormReply { response_json } => {
                (MessageKind::Interactive, response_json.clone(), None)
            }
            Self::Media {
                kind,
                caption,
                media_id,
            } => {
                let body = caption
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("[{}]", kind.as_str()));
                let extra = media_id
                    .as_ref()
                    .map(|id| serde_json::json!({ "media_id": id }));
                (*kind, body, extra)
            }
            Self::Unsupported(kind) => (MessageKind::Text, format!("[unsupported:{}]", kind), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Messages handled successfully
    Processed(usize),
    TenantNotFound,
    TenantInactive,
}

/// External collaborators the engine is built from
pub struct EngineComponents {
    pub stores: PersistenceLayer,
    pub llm: Arc<dyn LlmBackend>,
    pub messenger: Arc<dyn Messenger>,
    pub tenant_cache: Arc<dyn Cache<String, Organization>>,
    pub knowledge_cache: Arc<dyn Cache<String, Arc<str>>>,
}

impl EngineComponents {
    /// In-process caches: tenants expire per `tenancy.cache_ttl_secs`,
    /// knowledge text lives until cleared
    pub fn new(
        settings: &Settings,
        stores: PersistenceLayer,
        llm: Arc<dyn LlmBackend>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            stores,
            llm,
            messenger,
            tenant_cache: Arc::new(MemoryCache::new(ExpiryPolicy::from_secs(
                settings.tenancy.cache_ttl_secs,
            ))),
            knowledge_cache: Arc::new(MemoryCache::new(ExpiryPolicy::Never)),
        }
    }
}

pub struct ChatEngine {
    tenants: TenantResolver,
    contacts: ContactManager,
    router: IntentRouter,
    flows: FlowHandlers,
    knowledge: Arc<KnowledgeStore>,
    notifications: NotificationEmitter,
    stores: PersistenceLayer,
    locks: ContactLocks,
}

impl ChatEngine {
    pub fn new(settings: &Settings, components: EngineComponents) -> Result<Self, AgentError> {
        let EngineComponents {
            stores,
            llm,
            messenger,
            tenant_cache,
            knowledge_cache,
        } = components;
        let llm_timeout = Duration::from_secs(settings.timeouts.llm_secs);

        let notifications = NotificationEmitter::new(stores.notifications.clone());
        let knowledge = Arc::new(KnowledgeStore::new(
            &settings.knowledge,
            knowledge_cache,
            llm.clone(),
            llm_timeout,
        )?);

        let welcome = WelcomeConfig {
            default_template: settings.whatsapp.default_welcome_template.clone(),
            language: settings.whatsapp.template_language.clone(),
            text: settings.prompts.welcome_text.clone(),
        };

        Ok(Self {
            tenants: TenantResolver::new(
                stores.organizations.clone(),
                tenant_cache,
                settings.tenancy.default_tenant_id.clone(),
            ),
            contacts: ContactManager::new(
                stores.contacts.clone(),
                messenger,
                notifications.clone(),
                welcome,
            ),
            router: IntentRouter::new(
                llm.clone(),
                IntentCatalog::new()?,
                settings.llm.max_history_turns,
                llm_timeout,
            ),
            flows: FlowHandlers::new(
                stores.clone(),
                knowledge.clone(),
                Triage::new(llm, llm_timeout),
                settings.prompts.clone(),
            ),
            knowledge,
            notifications,
            stores,
            locks: DashMap::new(),
        })
    }

    /// Resolve the tenant and handle every message in the event
    ///
    /// Store failures during tenant resolution are returned; failures while
    /// handling a single message are logged and do not stop the others.
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<EventOutcome, AgentError> {
        let Some(organization) = self.tenants.resolve(&event.tenant).await? else {
            tracing::warn!(tenant = ?event.tenant, "No organization for inbound event, dropping");
            return Ok(EventOutcome::TenantNotFound);
        };

        if !organization.active {
            tracing::info!(tenant = %organization.id, "Organization inactive, dropping event");
            return Ok(EventOutcome::TenantInactive);
        }

        let mut processed = 0;
        for message in &event.messages {
            match self.handle_message(&organization, message).await {
                Ok(()) => processed += 1,
                Err(e) => tracing::error!(
                    tenant = %organization.id,
                    phone = %message.from,
                    message_id = %message.id,
                    error = %e,
                    "Failed to handle inbound message"
                ),
            }
        }
        Ok(EventOutcome::Processed(processed))
    }

    async fn handle_message(
        &self,
        organization: &Organization,
        message: &InboundMessage,
    ) -> Result<(), AgentError> {
        let slot = ContactSlot::acquire(
            &self.locks,
            (organization.id.clone(), message.from.clone()),
        );
        let _turn = slot.lock.lock().await;
        self.process(organization, message).await
    }

    async fn process(
        &self,
        organization: &Organization,
        message: &InboundMessage,
    ) -> Result<(), AgentError> {
        let display_name = message.profile_name.as_deref().unwrap_or_default();
        let (mut contact, _) = self
            .contacts
            .get_or_create(organization, &message.from, display_name)
            .await?;

        let (kind, body, extra) = message.content.transcript();
        self.contacts
            .append_transcript(
                &mut contact,
                Direction::Inbound,
                &message.from,
                &organization.whatsapp.phone_number_id,
                kind,
                &body,
                extra,
            )
            .await?;

        if !contact.bot_enabled {
            tracing::debug!(tenant = %organization.id, phone = %contact.phone, "Bot disabled for contact");
            return Ok(());
        }

        let outcome = self.dispatch(organization, &mut contact, &message.content).await;
        self.contacts.save(&contact).await?;
        self.deliver(organization, &mut contact, outcome).await;
        Ok(())
    }

    async fn dispatch(
        &self,
        organization: &Organization,
        contact: &mut Contact,
        content: &InboundContent,
    ) -> FlowOutcome {
        let prompts = self.flows.prompts();
        match content {
            InboundContent::FormReply { response_json } => match FormPayload::parse(response_json) {
                Ok(payload) => self.flows.submit_form(organization, contact, &payload).await,
                Err(e) => {
                    tracing::warn!(tenant = %organization.id, error = %e, "Malformed form reply");
                    FlowOutcome::reply(prompts.unrecognized_reply.clone())
                }
            },
            InboundContent::Text(text) if checkin::is_command(text, &organization.id) => {
                self.flows.check_in(organization, contact).await
            }
            InboundContent::Text(text) => {
                self.router
                    .converse(organization, contact, text, &self.flows)
                    .await
            }
            InboundContent::Media { .. } => {
                FlowOutcome::reply(PromptsConfig::render(&prompts.media_ack, &organization.name))
            }
            InboundContent::Unsupported(kind) => {
                tracing::debug!(tenant = %organization.id, kind = %kind, "Ignoring unsupported message");
                FlowOutcome::silent()
            }
        }
    }

    /// Prompts first, then the reply, then notifications
    async fn deliver(&self, organization: &Organization, contact: &mut Contact, outcome: FlowOutcome) {
        for prompt in &outcome.prompts {
            self.contacts.send(organization, contact, prompt).await;
        }
        if let Some(reply) = outcome.reply {
            self.contacts
                .send(organization, contact, &OutboundMessage::text(reply))
                .await;
        }
        self.notifications
            .emit_all(&organization.id, &outcome.events)
            .await;
    }

    /// Fill fields older contacts predate: a self patient and last-seen
    ///
    /// Returns how many contacts were updated.
    pub async fn backfill(&self, tenant: Option<&str>) -> Result<usize, AgentError> {
        let tenant_ids: Vec<String> = match tenant {
            Some(id) => vec![id.to_string()],
            None => self.tenants.list().await?.into_iter().map(|o| o.id).collect(),
        };

        let mut updated = 0;
        for tenant_id in tenant_ids {
            for mut contact in self.stores.contacts.list(&tenant_id).await? {
                if !backfill_contact(&mut contact) {
                    continue;
                }
                self.stores.contacts.save(&contact).await?;
                updated += 1;
            }
        }
        tracing::info!(updated, "Contact backfill finished");
        Ok(updated)
    }

    pub fn tenants(&self) -> &TenantResolver {
        &self.tenants
    }

    pub fn contacts(&self) -> &ContactManager {
        &self.contacts
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn stores(&self) -> &PersistenceLayer {
        &self.stores
    }
}

type ContactLocks = DashMap<(String, String), Arc<Mutex<()>>>;

/// Holds one contact's turn mutex; the map entry goes away with the last holder
///
/// Cleanup runs on drop, so a cancelled turn does not leave its entry behind.
struct ContactSlot<'a> {
    locks: &'a ContactLocks,
    key: (String, String),
    lock: Arc<Mutex<()>>,
}

impl<'a> ContactSlot<'a> {
    fn acquire(locks: &'a ContactLocks, key: (String, String)) -> Self {
        let lock = locks.entry(key.clone()).or_default().clone();
        Self { locks, key, lock }
    }
}

impl Drop for ContactSlot<'_> {
    fn drop(&mut self) {
        // The map and this slot are the only holders
        self.locks.remove_if(&self.key, |_, l| {
            Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2
        });
    }
}

fn backfill_contact(contact: &mut Contact) -> bool {
    let mut changed = false;
    if contact.self_patient_mut().is_none() {
        contact.patients.insert(
            0,
            careline_core::Patient::new(contact.name.clone(), careline_core::Relation::SelfRelation),
        );
        changed = true;
    }
    if contact.last_seen.is_none() {
        contact.last_seen = Some(contact.created_at);
        changed = true;
    }
    changed
}
