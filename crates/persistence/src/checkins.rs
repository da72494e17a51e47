//! Check-in persistence

use crate::codec::{from_millis, to_millis};
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::CheckIn;
use parking_lot::RwLock;

#[async_trait]
pub trait CheckInStore: Send + Sync {
    async fn create(&self, checkin: &CheckIn) -> Result<(), PersistenceError>;

    async fn list(&self, organization_id: &str) -> Result<Vec<CheckIn>, PersistenceError>;
}

#[derive(Clone)]
pub struct ScyllaCheckInStore {
    client: ScyllaClient,
}

impl ScyllaCheckInStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CheckInStore for ScyllaCheckInStore {
    async fn create(&self, checkin: &CheckIn) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.checkins (organization_id, checkin_id, contact_phone, created_at)
             VALUES (?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &checkin.organization_id,
                    &checkin.id,
                    &checkin.contact_phone,
                    to_millis(checkin.timestamp),
                ),
            )
            .await?;

        tracing::info!(checkin_id = %checkin.id, tenant = %checkin.organization_id, "Check-in recorded");
        Ok(())
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<CheckIn>, PersistenceError> {
        let query = format!(
            "SELECT checkin_id, contact_phone, created_at FROM {}.checkins WHERE organization_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id,))
            .await?;

        let mut checkins = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (id, contact_phone, created_at): (String, String, i64) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            checkins.push(CheckIn {
                id,
                organization_id: organization_id.to_string(),
                contact_phone,
                timestamp: from_millis(created_at),
            });
        }
        checkins.sort_by_key(|c| c.timestamp);
        Ok(checkins)
    }
}

#[derive(Default)]
pub struct InMemoryCheckInStore {
    checkins: RwLock<Vec<CheckIn>>,
}

impl InMemoryCheckInStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckInStore for InMemoryCheckInStore {
    async fn create(&self, checkin: &CheckIn) -> Result<(), PersistenceError> {
        self.checkins.write().push(checkin.clone());
        Ok(())
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<CheckIn>, PersistenceError> {
        Ok(self
            .checkins
            .read()
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect())
    }
}
