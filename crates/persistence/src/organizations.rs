//! Organization (tenant) store
//!
//! Organizations are created and edited by external admin tooling; this
//! subsystem only reads them, plus `upsert` for seeding.

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::Organization;
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Organization>, PersistenceError>;

    /// Looks up the primary phone-number-id field first, then the legacy alias
    async fn find_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Organization>, PersistenceError>;

    async fn list(&self) -> Result<Vec<Organization>, PersistenceError>;

    async fn upsert(&self, organization: &Organization) -> Result<(), PersistenceError>;
}

/// ScyllaDB implementation of the organization store
#[derive(Clone)]
pub struct ScyllaOrganizationStore {
    client: ScyllaClient,
}

impl ScyllaOrganizationStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn select_one(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Organization>, PersistenceError> {
        let query = format!(
            "SELECT config_json FROM {}.organizations WHERE {} = ?",
            self.client.keyspace(),
            column
        );

        let result = self.client.session().query_unpaged(query, (value,)).await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(Self::row_to_organization(row)?));
            }
        }

        Ok(None)
    }

    fn row_to_organization(
        row: scylla::frame::response::result::Row,
    ) -> Result<Organization, PersistenceError> {
        let (config_json,): (String,) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        serde_json::from_str(&config_json)
            .map_err(|e| PersistenceError::InvalidData(format!("organization config: {}", e)))
    }
}

#[async_trait]
impl OrganizationStore for ScyllaOrganizationStore {
    async fn get(&self, id: &str) -> Result<Option<Organization>, PersistenceError> {
        self.select_one("id", id).await
    }

    async fn find_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Organization>, PersistenceError> {
        if let Some(org) = self.select_one("phone_number_id", phone_number_id).await? {
            return Ok(Some(org));
        }
        self.select_one("legacy_phone_number_id", phone_number_id)
            .await
    }

    async fn list(&self) -> Result<Vec<Organization>, PersistenceError> {
        let query = format!("SELECT config_json FROM {}.organizations", self.client.keyspace());
        let result = self.client.session().query_unpaged(query, &[]).await?;

        let mut organizations = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                organizations.push(Self::row_to_organization(row)?);
            }
        }
        organizations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(organizations)
    }

    async fn upsert(&self, organization: &Organization) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.organizations (
                id, name, active, phone_number_id, legacy_phone_number_id, config_json
            ) VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &organization.id,
                    &organization.name,
                    organization.active,
                    &organization.whatsapp.phone_number_id,
                    &organization.whatsapp.legacy_phone_number_id,
                    serde_json::to_string(organization)?,
                ),
            )
            .await?;

        tracing::info!(tenant = %organization.id, "Organization saved in ScyllaDB");
        Ok(())
    }
}

/// In-memory organization store
#[derive(Default)]
pub struct InMemoryOrganizationStore {
    organizations: RwLock<HashMap<String, Organization>>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(organizations: impl IntoIterator<Item = Organization>) -> Self {
        let store = Self::new();
        {
            let mut map = store.organizations.write();
            for org in organizations {
                map.insert(org.id.clone(), org);
            }
        }
        store
    }
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn get(&self, id: &str) -> Result<Option<Organization>, PersistenceError> {
        Ok(self.organizations.read().get(id).cloned())
    }

    async fn find_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Organization>, PersistenceError> {
        let organizations = self.organizations.read();
        let primary = organizations
            .values()
            .find(|o| o.whatsapp.phone_number_id == phone_number_id);
        let found = primary.or_else(|| {
            organizations.values().find(|o| {
                o.whatsapp.legacy_phone_number_id.as_deref() == Some(phone_number_id)
            })
        });
        Ok(found.cloned())
    }

    async fn list(&self) -> Result<Vec<Organization>, PersistenceError> {
        let mut organizations: Vec<Organization> =
            self.organizations.read().values().cloned().collect();
        organizations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(organizations)
    }

    async fn upsert(&self, organization: &Organization) -> Result<(), PersistenceError> {
        self.organizations
            .write()
            .insert(organization.id.clone(), organization.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phone_number_lookup_prefers_primary_field() {
        let mut legacy = Organization::new("old", "Old Clinic");
        legacy.whatsapp.legacy_phone_number_id = Some("555".to_string());
        let current = Organization::new("new", "New Clinic").with_credentials("tok", "555");

        let store = InMemoryOrganizationStore::with_organizations([legacy, current]);
        let found = store.find_by_phone_number_id("555").await.unwrap().unwrap();
        assert_eq!(found.id, "new");
    }

    #[tokio::test]
    async fn test_phone_number_lookup_falls_back_to_legacy() {
        let mut legacy = Organization::new("old", "Old Clinic");
        legacy.whatsapp.legacy_phone_number_id = Some("777".to_string());

        let store = InMemoryOrganizationStore::with_organizations([legacy]);
        let found = store.find_by_phone_number_id("777").await.unwrap().unwrap();
        assert_eq!(found.id, "old");
        assert!(store.find_by_phone_number_id("000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = InMemoryOrganizationStore::new();
        store.upsert(&Organization::new("b", "B")).await.unwrap();
        store.upsert(&Organization::new("a", "A")).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
