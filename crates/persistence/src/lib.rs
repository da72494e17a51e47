//! Persistence layer for the careline chatbot
//!
//! Provides storage for:
//! - Organizations (tenant configuration, read-mostly)
//! - Contacts with their patients, LLM history and chat transcripts
//! - Appointments, support tickets and check-ins
//! - Dashboard notifications
//!
//! Every store has a ScyllaDB implementation and an in-memory one behind the
//! same trait.

pub mod appointments;
pub mod checkins;
pub mod client;
mod codec;
pub mod contacts;
pub mod error;
pub mod notifications;
pub mod organizations;
pub mod schema;
pub mod tickets;

pub use appointments::{AppointmentStore, InMemoryAppointmentStore, ScyllaAppointmentStore};
pub use checkins::{CheckInStore, InMemoryCheckInStore, ScyllaCheckInStore};
pub use client::{ScyllaClient, ScyllaConfig};
pub use contacts::{ContactStore, InMemoryContactStore, ScyllaContactStore};
pub use error::PersistenceError;
pub use notifications::{InMemoryNotificationStore, NotificationStore, ScyllaNotificationStore};
pub use organizations::{InMemoryOrganizationStore, OrganizationStore, ScyllaOrganizationStore};
pub use tickets::{InMemoryTicketStore, ScyllaTicketStore, TicketStore};

use std::sync::Arc;

/// Initialize the persistence layer with ScyllaDB
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        organizations: Arc::new(ScyllaOrganizationStore::new(client.clone())),
        contacts: Arc::new(ScyllaContactStore::new(client.clone())),
        appointments: Arc::new(ScyllaAppointmentStore::new(client.clone())),
        tickets: Arc::new(ScyllaTicketStore::new(client.clone())),
        checkins: Arc::new(ScyllaCheckInStore::new(client.clone())),
        notifications: Arc::new(ScyllaNotificationStore::new(client)),
    })
}

/// Combined persistence layer with all stores
#[derive(Clone)]
pub struct PersistenceLayer {
    pub organizations: Arc<dyn OrganizationStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub checkins: Arc<dyn CheckInStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl PersistenceLayer {
    /// All stores in memory; used in development and tests
    pub fn in_memory() -> Self {
        Self::in_memory_with(Arc::new(InMemoryOrganizationStore::new()))
    }

    /// In-memory stores around a given organization store
    pub fn in_memory_with(organizations: Arc<dyn OrganizationStore>) -> Self {
        Self {
            organizations,
            contacts: Arc::new(InMemoryContactStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            tickets: Arc::new(InMemoryTicketStore::new()),
            checkins: Arc::new(InMemoryCheckInStore::new()),
            notifications: Arc::new(InMemoryNotificationStore::new()),
        }
    }
}
