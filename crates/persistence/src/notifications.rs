//! Notification persistence
//!
//! Notifications are written once and later only flipped to seen.

use crate::codec::{decode_json, encode_json, from_millis, to_millis};
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::{Notification, NotificationKind};
use parking_lot::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), PersistenceError>;

    /// Newest first
    async fn list(
        &self,
        organization_id: &str,
        unseen_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, PersistenceError>;

    /// Returns how many of the ids existed
    async fn mark_seen(
        &self,
        organization_id: &str,
        ids: &[Uuid],
    ) -> Result<usize, PersistenceError>;

    async fn count_unseen(&self, organization_id: &str) -> Result<usize, PersistenceError>;
}

#[derive(Clone)]
pub struct ScyllaNotificationStore {
    client: ScyllaClient,
}

impl ScyllaNotificationStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn all(&self, organization_id: &str) -> Result<Vec<Notification>, PersistenceError> {
        let query = format!(
            "SELECT notification_id, from_addr, message, kind, created_at, seen, refs_json
             FROM {}.notifications WHERE organization_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id,))
            .await?;

        let mut notifications = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (id, from, message, kind, created_at, seen, refs_json): (
                Uuid,
                String,
                String,
                String,
                i64,
                Option<bool>,
                Option<String>,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

            let kind = NotificationKind::parse(&kind)
                .ok_or_else(|| PersistenceError::InvalidData(format!("notification kind {}", kind)))?;

            notifications.push(Notification {
                id,
                organization_id: organization_id.to_string(),
                from,
                message,
                kind,
                created_at: from_millis(created_at),
                seen: seen.unwrap_or(false),
                refs: decode_json(refs_json)?,
            });
        }
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }
}

#[async_trait]
impl NotificationStore for ScyllaNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.notifications (
                organization_id, notification_id, from_addr, message, kind,
                created_at, seen, refs_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &notification.organization_id,
                    notification.id,
                    &notification.from,
                    &notification.message,
                    notification.kind.as_str(),
                    to_millis(notification.created_at),
                    notification.seen,
                    encode_json(&notification.refs)?,
                ),
            )
            .await?;

        Ok(())
    }

    async fn list(
        &self,
        organization_id: &str,
        unseen_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, PersistenceError> {
        Ok(self
            .all(organization_id)
            .await?
            .into_iter()
            .filter(|n| !unseen_only || !n.seen)
            .take(limit)
            .collect())
    }

    async fn mark_seen(
        &self,
        organization_id: &str,
        ids: &[Uuid],
    ) -> Result<usize, PersistenceError> {
        let existing: Vec<Uuid> = self
            .all(organization_id)
            .await?
            .into_iter()
            .map(|n| n.id)
            .filter(|id| ids.contains(id))
            .collect();

        let query = format!(
            "UPDATE {}.notifications SET seen = true
             WHERE organization_id = ? AND notification_id = ?",
            self.client.keyspace()
        );
        for id in &existing {
            self.client
                .session()
                .query_unpaged(query.clone(), (organization_id, *id))
                .await?;
        }
        Ok(existing.len())
    }

    async fn count_unseen(&self, organization_id: &str) -> Result<usize, PersistenceError> {
        Ok(self
            .all(organization_id)
            .await?
            .iter()
            .filter(|n| !n.seen)
            .count())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<(), PersistenceError> {
        self.notifications.write().push(notification.clone());
        Ok(())
    }

    async fn list(
        &self,
        organization_id: &str,
        unseen_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, PersistenceError> {
        let mut found: Vec<Notification> = self
            .notifications
            .read()
            .iter()
            .filter(|n| n.organization_id == organization_id)
            .filter(|n| !unseen_only || !n.seen)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn mark_seen(
        &self,
        organization_id: &str,
        ids: &[Uuid],
    ) -> Result<usize, PersistenceError> {
        let mut updated = 0;
        for notification in self.notifications.write().iter_mut() {
            if notification.organization_id == organization_id && ids.contains(&notification.id) {
                notification.seen = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_unseen(&self, organization_id: &str) -> Result<usize, PersistenceError> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| n.organization_id == organization_id && !n.seen)
            .count())
    }
}
