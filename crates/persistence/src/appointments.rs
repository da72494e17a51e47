//! Appointment persistence

use crate::codec::{decode_json, encode_json, from_millis, to_millis};
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use careline_core::{Appointment, AppointmentStatus, Feedback, Gender};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Appointment store trait
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: &Appointment) -> Result<(), PersistenceError>;

    async fn get(
        &self,
        organization_id: &str,
        appointment_id: &str,
    ) -> Result<Option<Appointment>, PersistenceError>;

    /// Exact match on the flow correlation token
    async fn find_by_flow_token(
        &self,
        organization_id: &str,
        flow_token: &str,
    ) -> Result<Option<Appointment>, PersistenceError>;

    /// Attach (or overwrite) feedback on an existing appointment
    async fn attach_feedback(
        &self,
        organization_id: &str,
        appointment_id: &str,
        feedback: &Feedback,
    ) -> Result<(), PersistenceError>;

    async fn list_for_contact(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Vec<Appointment>, PersistenceError>;
}

const APPOINTMENT_COLUMNS: &str = "organization_id, appointment_id, contact_phone, doctor_id, \
    doctor_name, patient_name, patient_age, patient_gender, specialty, appointment_date, \
    appointment_time, reason, status, flow_token, feedback_json, created_at";

/// ScyllaDB implementation of appointment store
#[derive(Clone)]
pub struct ScyllaAppointmentStore {
    client: ScyllaClient,
}

impl ScyllaAppointmentStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn select(
        &self,
        filter: &str,
        values: (&str, &str),
    ) -> Result<Vec<Appointment>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM {}.appointments WHERE organization_id = ? AND {}",
            APPOINTMENT_COLUMNS,
            self.client.keyspace(),
            filter
        );

        let result = self.client.session().query_unpaged(query, values).await?;

        let mut appointments = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                appointments.push(self.row_to_appointment(row)?);
            }
        }
        Ok(appointments)
    }

    fn row_to_appointment(
        &self,
        row: scylla::frame::response::result::Row,
    ) -> Result<Appointment, PersistenceError> {
        let (
            organization_id,
            id,
            contact_phone,
            doctor_id,
            doctor_name,
            patient_name,
            patient_age,
            patient_gender,
            specialty,
            date,
            time,
            reason,
            status,
            flow_token,
            feedback_json,
            created_at,
        ): (
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<i32>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            i64,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(Appointment {
            id,
            organization_id,
            contact_phone,
            doctor_id: doctor_id.unwrap_or_default(),
            doctor_name,
            patient_name: patient_name.unwrap_or_default(),
            patient_age: patient_age.and_then(|age| u32::try_from(age).ok()),
            patient_gender: patient_gender.as_deref().and_then(Gender::from_label),
            specialty: specialty.unwrap_or_default(),
            date: date.unwrap_or_default(),
            time: time.unwrap_or_default(),
            reason: reason.unwrap_or_default(),
            status: AppointmentStatus::parse(status.as_deref().unwrap_or_default()),
            flow_token: flow_token.unwrap_or_default(),
            feedback: decode_json(feedback_json)?,
            created_at: from_millis(created_at),
        })
    }
}

#[async_trait]
impl AppointmentStore for ScyllaAppointmentStore {
    async fn create(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.appointments ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            APPOINTMENT_COLUMNS
        );

        let feedback = match &appointment.feedback {
            Some(feedback) => Some(encode_json(feedback)?),
            None => None,
        };

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &appointment.organization_id,
                    &appointment.id,
                    &appointment.contact_phone,
                    &appointment.doctor_id,
                    &appointment.doctor_name,
                    &appointment.patient_name,
                    appointment.patient_age.and_then(|age| i32::try_from(age).ok()),
                    appointment.patient_gender.map(|g| g.as_str()),
                    &appointment.specialty,
                    &appointment.date,
                    &appointment.time,
                    &appointment.reason,
                    appointment.status.as_str(),
                    &appointment.flow_token,
                    feedback,
                    to_millis(appointment.created_at),
                ),
            )
            .await?;

        tracing::info!(
            appointment_id = %appointment.id,
            tenant = %appointment.organization_id,
            contact_phone = %appointment.contact_phone,
            "Appointment created in ScyllaDB"
        );

        Ok(())
    }

    async fn get(
        &self,
        organization_id: &str,
        appointment_id: &str,
    ) -> Result<Option<Appointment>, PersistenceError> {
        Ok(self
            .select("appointment_id = ?", (organization_id, appointment_id))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_flow_token(
        &self,
        organization_id: &str,
        flow_token: &str,
    ) -> Result<Option<Appointment>, PersistenceError> {
        Ok(self
            .select("flow_token = ?", (organization_id, flow_token))
            .await?
            .into_iter()
            .next())
    }

    async fn attach_feedback(
        &self,
        organization_id: &str,
        appointment_id: &str,
        feedback: &Feedback,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.appointments SET feedback_json = ?
             WHERE organization_id = ? AND appointment_id = ?",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (encode_json(feedback)?, organization_id, appointment_id),
            )
            .await?;

        tracing::info!(appointment_id = %appointment_id, "Appointment feedback attached");
        Ok(())
    }

    async fn list_for_contact(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Vec<Appointment>, PersistenceError> {
        // contact_phone is not indexed; appointments per tenant stay small
        let mut appointments = self
            .select("contact_phone = ? ALLOW FILTERING", (organization_id, phone))
            .await?;
        appointments.sort_by_key(|a| a.created_at);
        Ok(appointments)
    }
}

/// In-memory appointment store
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<(String, String), Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, appointment: &Appointment) -> Result<(), PersistenceError> {
        self.appointments.write().insert(
            (appointment.organization_id.clone(), appointment.id.clone()),
            appointment.clone(),
        );
        Ok(())
    }

    async fn get(
        &self,
        organization_id: &str,
        appointment_id: &str,
    ) -> Result<Option<Appointment>, PersistenceError> {
        Ok(self
            .appointments
            .read()
            .get(&(organization_id.to_string(), appointment_id.to_string()))
            .cloned())
    }

    async fn find_by_flow_token(
        &self,
        organization_id: &str,
        flow_token: &str,
    ) -> Result<Option<Appointment>, PersistenceError> {
        Ok(self
            .appointments
            .read()
            .values()
            .find(|a| a.organization_id == organization_id && a.flow_token == flow_token)
            .cloned())
    }

    async fn attach_feedback(
        &self,
        organization_id: &str,
        appointment_id: &str,
        feedback: &Feedback,
    ) -> Result<(), PersistenceError> {
        let mut appointments = self.appointments.write();
        let appointment = appointments
            .get_mut(&(organization_id.to_string(), appointment_id.to_string()))
            .ok_or_else(|| PersistenceError::NotFound(format!("appointment {}", appointment_id)))?;
        appointment.feedback = Some(feedback.clone());
        Ok(())
    }

    async fn list_for_contact(
        &self,
        organization_id: &str,
        phone: &str,
    ) -> Result<Vec<Appointment>, PersistenceError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| a.organization_id == organization_id && a.contact_phone == phone)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn feedback() -> Feedback {
        Feedback {
            recommend: Some(true),
            comments: "Great".to_string(),
            doctor_rating: Some(5),
            staff_rating: Some(4),
            facility_rating: Some(4),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_flow_token_lookup_is_exact_and_scoped() {
        let store = InMemoryAppointmentStore::new();
        let apt = Appointment::draft("acme", "+1", "123456");
        store.create(&apt).await.unwrap();

        assert!(store.find_by_flow_token("acme", "123456").await.unwrap().is_some());
        assert!(store.find_by_flow_token("acme", "12345").await.unwrap().is_none());
        assert!(store.find_by_flow_token("other", "123456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_feedback() {
        let store = InMemoryAppointmentStore::new();
        let apt = Appointment::draft("acme", "+1", "654321");
        store.create(&apt).await.unwrap();

        store.attach_feedback("acme", &apt.id, &feedback()).await.unwrap();
        let stored = store.get("acme", &apt.id).await.unwrap().unwrap();
        assert_eq!(stored.feedback.unwrap().doctor_rating, Some(5));

        let missing = store.attach_feedback("acme", "APT-missing", &feedback()).await;
        assert!(matches!(missing, Err(PersistenceError::NotFound(_))));
    }
}
