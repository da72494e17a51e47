//! Contact store and chat transcript persistence
//!
//! Contacts are keyed by (organization, phone). Creation is a conditional
//! insert so two first messages racing for the same pair yield one record.

use crate::codec::{decode_json, encode_json, from_millis, to_millis};
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::{ChatMessage, Contact, Direction, MessageKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, PersistenceError>;

    /// Insert unless a contact already exists for the pair.
    ///
    /// Returns the stored contact and whether this call created it.
    async fn create_if_absent(&self, contact: &Contact)
        -> Result<(Contact, bool), PersistenceError>;

    /// Overwrite the mutable fields of an existing contact
    async fn save(&self, contact: &Contact) -> Result<(), PersistenceError>;

    async fn touch(
        &self,
        organization_id: &str,
        phone: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError>;

    /// Transcript in arrival order, most recent `limit` entries
    async fn messages(
        &self,
        organization_id: &str,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError>;

    /// Contacts with this phone, in one tenant or across all of them
    async fn find_by_phone(
        &self,
        phone: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<Contact>, PersistenceError>;

    async fn list(&self, organization_id: &str) -> Result<Vec<Contact>, PersistenceError>;
}

const CONTACT_COLUMNS: &str = "organization_id, phone, name, bot_enabled, registered, \
                               last_seen, created_at, history_json, patients_json";

type ContactRow = (
    String,
    String,
    Option<String>,
    Option<bool>,
    Option<bool>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
);

/// ScyllaDB implementation of the contact store
#[derive(Clone)]
pub struct ScyllaContactStore {
    client: ScyllaClient,
}

impl ScyllaContactStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_contact(
        row: scylla::frame::response::result::Row,
    ) -> Result<Contact, PersistenceError> {
        let (
            organization_id,
            phone,
            name,
            bot_enabled,
            registered,
            last_seen,
            created_at,
            history_json,
            patients_json,
        ): ContactRow = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(Contact {
            organization_id,
            phone,
            name: name.unwrap_or_default(),
            bot_enabled: bot_enabled.unwrap_or(true),
            registered: registered.unwrap_or(false),
            last_seen: last_seen.map(from_millis),
            created_at: created_at.map(from_millis).unwrap_or_else(Utc::now),
            history: decode_json(history_json)?,
            patients: decode_json(patients_json)?,
        })
    }

    fn rows_to_contacts(
        rows: Option<Vec<scylla::frame::response::result::Row>>,
    ) -> Result<Vec<Contact>, PersistenceError> {
        rows.unwrap_or_default()
            .into_iter()
            .map(Self::row_to_contact)
            .collect()
    }
}

#[async_trait]
impl ContactStore for ScyllaContactStore {
    async fn get(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM {}.contacts WHERE organization_id = ? AND phone = ?",
            CONTACT_COLUMNS,
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id, phone))
            .await?;

        Ok(Self::rows_to_contacts(result.rows)?.into_iter().next())
    }

    async fn create_if_absent(
        &self,
        contact: &Contact,
    ) -> Result<(Contact, bool), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.contacts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
            self.client.keyspace(),
            CONTACT_COLUMNS
        );

        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    &contact.organization_id,
                    &contact.phone,
                    &contact.name,
                    contact.bot_enabled,
                    contact.registered,
                    contact.last_seen.map(to_millis),
                    to_millis(contact.created_at),
                    encode_json(&contact.history)?,
                    encode_json(&contact.patients)?,
                ),
            )
            .await?;

        // First column of an LWT result is `[applied]`
        let applied = result
            .rows
            .as_ref()
            .and_then(|rows| rows.first())
            .and_then(|row| row.columns.first())
            .and_then(|col| col.as_ref())
            .and_then(|value| value.as_boolean())
            .unwrap_or(false);

        if applied {
            tracing::info!(
                tenant = %contact.organization_id,
                phone = %contact.phone,
                "Contact created in ScyllaDB"
            );
            return Ok((contact.clone(), true));
        }

        let existing = self
            .get(&contact.organization_id, &contact.phone)
            .await?
            .ok_or_else(|| {
                PersistenceError::NotFound(format!(
                    "contact {}/{} vanished after conditional insert",
                    contact.organization_id, contact.phone
                ))
            })?;
        Ok((existing, false))
    }

    async fn save(&self, contact: &Contact) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.contacts SET name = ?, bot_enabled = ?, registered = ?, last_seen = ?,
                 history_json = ?, patients_json = ?
             WHERE organization_id = ? AND phone = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &contact.name,
                    contact.bot_enabled,
                    contact.registered,
                    contact.last_seen.map(to_millis),
                    encode_json(&contact.history)?,
                    encode_json(&contact.patients)?,
                    &contact.organization_id,
                    &contact.phone,
                ),
            )
            .await?;

        Ok(())
    }

    async fn touch(
        &self,
        organization_id: &str,
        phone: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.contacts SET last_seen = ? WHERE organization_id = ? AND phone = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(query, (to_millis(at), organization_id, phone))
            .await?;

        Ok(())
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.chat_messages (
                organization_id, phone, created_at, message_id, direction,
                from_addr, to_addr, kind, body, extra_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let extra = match &message.extra {
            Some(value) => Some(encode_json(value)?),
            None => None,
        };

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &message.organization_id,
                    &message.phone,
                    to_millis(message.timestamp),
                    Uuid::new_v4(),
                    message.direction.as_str(),
                    &message.from,
                    &message.to,
                    message.kind.as_str(),
                    &message.body,
                    extra,
                ),
            )
            .await?;

        Ok(())
    }

    async fn messages(
        &self,
        organization_id: &str,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        let query = format!(
            "SELECT created_at, direction, from_addr, to_addr, kind, body, extra_json
             FROM {}.chat_messages WHERE organization_id = ? AND phone = ?
             ORDER BY created_at DESC LIMIT ?",
            self.client.keyspace()
        );

        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id, phone, limit))
            .await?;

        let mut messages = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (created_at, direction, from, to, kind, body, extra_json): (
                i64,
                String,
                String,
                String,
                String,
                String,
                Option<String>,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

            messages.push(ChatMessage {
                organization_id: organization_id.to_string(),
                phone: phone.to_string(),
                direction: Direction::parse(&direction),
                from,
                to,
                kind: MessageKind::parse(&kind),
                body,
                timestamp: from_millis(created_at),
                extra: decode_json::<Option<serde_json::Value>>(extra_json)?,
            });
        }
        messages.reverse();
        Ok(messages)
    }

    async fn find_by_phone(
        &self,
        phone: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<Contact>, PersistenceError> {
        if let Some(org) = organization_id {
            return Ok(self.get(org, phone).await?.into_iter().collect());
        }

        let query = format!(
            "SELECT {} FROM {}.contacts WHERE phone = ?",
            CONTACT_COLUMNS,
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (phone,)).await?;
        Self::rows_to_contacts(result.rows)
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<Contact>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM {}.contacts WHERE organization_id = ?",
            CONTACT_COLUMNS,
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(query, (organization_id,))
            .await?;
        Self::rows_to_contacts(result.rows)
    }
}

type ContactKey = (String, String);

fn key(organization_id: &str, phone: &str) -> ContactKey {
    (organization_id.to_string(), phone.to_string())
}

/// In-memory contact store
#[derive(Default)]
pub struct InMemoryContactStore {
    contacts: RwLock<HashMap<ContactKey, Contact>>,
    messages: RwLock<HashMap<ContactKey, Vec<ChatMessage>>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn get(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, PersistenceError> {
        Ok(self.contacts.read().get(&key(organization_id, phone)).cloned())
    }

    async fn create_if_absent(
        &self,
        contact: &Contact,
    ) -> Result<(Contact, bool), PersistenceError> {
        match self
            .contacts
            .write()
            .entry(key(&contact.organization_id, &contact.phone))
        {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(contact.clone());
                Ok((contact.clone(), true))
            }
        }
    }

    async fn save(&self, contact: &Contact) -> Result<(), PersistenceError> {
        let mut contacts = self.contacts.write();
        match contacts.get_mut(&key(&contact.organization_id, &contact.phone)) {
            Some(stored) => {
                *stored = contact.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound(format!(
                "contact {}/{}",
                contact.organization_id, contact.phone
            ))),
        }
    }

    async fn touch(
        &self,
        organization_id: &str,
        phone: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        if let Some(contact) = self.contacts.write().get_mut(&key(organization_id, phone)) {
            contact.last_seen = Some(at);
        }
        Ok(())
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        self.messages
            .write()
            .entry(key(&message.organization_id, &message.phone))
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages(
        &self,
        organization_id: &str,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        let messages = self.messages.read();
        let all = messages
            .get(&key(organization_id, phone))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn find_by_phone(
        &self,
        phone: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<Contact>, PersistenceError> {
        let mut found: Vec<Contact> = self
            .contacts
            .read()
            .values()
            .filter(|c| c.phone == phone)
            .filter(|c| organization_id.map_or(true, |org| c.organization_id == org))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.organization_id.cmp(&b.organization_id));
        Ok(found)
    }

    async fn list(&self, organization_id: &str) -> Result<Vec<Contact>, PersistenceError> {
        let mut found: Vec<Contact> = self
            .contacts
            .read()
            .values()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.phone.cmp(&b.phone));
        Ok(found)
    }
}
