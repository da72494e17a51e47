//! Support ticket persistence

use crate::codec::{from_millis, to_millis};
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::{SupportTicket, TicketStatus};
use parking_lot::RwLock;

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, ticket: &SupportTicket) -> Result<(), PersistenceError>;

    async fn list(&self, organization_id: &str) -> Result<Vec<SupportTicket>, PersistenceError>;
}

#[derive(Clone)]
pub struct ScyllaTicketStore {
    client: ScyllaClient,
}

impl ScyllaTicketStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TicketStore for ScyllaTicketStore {
    async fn create(&self, ticket: &SupportTicket) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.support_tickets (
                organization_id, ticket_id, contact_phone, description,
                urgency, category, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &ticket.organization_id,
                    &ticket.id,
                    &ticket.contact_phone,
                    &ticket.description,
                    &ticket.urgency,
                    &ticket.category,
                    ticket.status.as_str(),
                    to_millis(ticket.created_at),
                ),
            )
            .await?;

        tracing::info!(
            ticket_id = %ticket.id,
            tenant = %ticket.organization_id,
            urgency = %ticket.urgency,
            "Support ticket created in ScyllaDB"
        );
        Ok(())
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<SupportTicket>, PersistenceError> {
        let query = format!(
            "SELECT ticket_id, contact_phone, description, urgency, category, created_at
             FROM {}.support_tickets WHERE organization_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id,))
            .await?;

        let mut tickets = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (id, contact_phone, description, urgency, category, created_at): (
                String,
                String,
                String,
                String,
                String,
                i64,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            tickets.push(SupportTicket {
                id,
                organization_id: organization_id.to_string(),
                contact_phone,
                description,
                urgency,
                category,
                status: TicketStatus::Open,
                created_at: from_millis(created_at),
            });
        }
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }
}

#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<Vec<SupportTicket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create(&self, ticket: &SupportTicket) -> Result<(), PersistenceError> {
        self.tickets.write().push(ticket.clone());
        Ok(())
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<SupportTicket>, PersistenceError> {
        Ok(self
            .tickets
            .read()
            .iter()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect())
    }
}
