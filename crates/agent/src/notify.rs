//! Notification emission
//!
//! Flow handlers describe what happened as [`NotificationEvent`]s; the engine
//! emits them once the primary record is committed.

use std::sync::Arc;

use careline_core::{Notification, NotificationKind};
use careline_persistence::{NotificationStore, PersistenceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    NewContact {
        phone: String,
        name: String,
    },
    AppointmentCreated {
        phone: String,
        appointment_id: String,
        patient_name: String,
        doctor_name: Option<String>,
        date: String,
        time: String,
    },
    TicketOpened {
        phone: String,
        ticket_id: String,
        urgency: String,
        category: String,
    },
    CheckedIn {
        phone: String,
        checkin_id: String,
    },
    FeedbackReceived {
        phone: String,
        appointment_id: String,
    },
    Registered {
        phone: String,
        name: String,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NewContact { .. } => NotificationKind::NewContact,
            Self::AppointmentCreated { .. } => NotificationKind::Appointment,
            Self::TicketOpened { .. } => NotificationKind::SupportTicket,
            Self::CheckedIn { .. } => NotificationKind::CheckIn,
            Self::FeedbackReceived { .. } => NotificationKind::Feedback,
            Self::Registered { .. } => NotificationKind::Registration,
        }
    }

    /// Dashboard document for this event
    pub fn to_notification(&self, organization_id: &str) -> Notification {
        let kind = self.kind();
        match self {
            Self::NewContact { phone, name } => {
                Notification::new(organization_id, kind, phone, format!("New contact: {}", name))
                    .with_ref("contact_phone", phone)
            }
            Self::AppointmentCreated {
                phone,
                appointment_id,
                patient_name,
                doctor_name,
                date,
                time,
            } => Notification::new(
                organization_id,
                kind,
                phone,
                format!(
                    "Appointment request for {} with {} on {} at {}",
                    patient_name,
                    doctor_name.as_deref().unwrap_or("any doctor"),
                    date,
                    time
                ),
            )
            .with_ref("appointment_id", appointment_id)
            .with_ref("contact_phone", phone),
            Self::TicketOpened {
                phone,
                ticket_id,
                urgency,
                category,
            } => Notification::new(
                organization_id,
                kind,
                phone,
                format!("Support ticket ({}, {} urgency)", category, urgency),
            )
            .with_ref("ticket_id", ticket_id)
            .with_ref("contact_phone", phone),
            Self::CheckedIn { phone, checkin_id } => {
                Notification::new(organization_id, kind, phone, "Patient checked in")
                    .with_ref("checkin_id", checkin_id)
                    .with_ref("contact_phone", phone)
            }
            Self::FeedbackReceived {
                phone,
                appointment_id,
            } => Notification::new(organization_id, kind, phone, "Feedback received")
                .with_ref("appointment_id", appointment_id)
                .with_ref("contact_phone", phone),
            Self::Registered { phone, name } => {
                Notification::new(organization_id, kind, phone, format!("{} registered", name))
                    .with_ref("contact_phone", phone)
            }
        }
    }
}

/// Writes notification documents for downstream dashboards
#[derive(Clone)]
pub struct NotificationEmitter {
    store: Arc<dyn NotificationStore>,
}

impl NotificationEmitter {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn emit(
        &self,
        organization_id: &str,
        event: &NotificationEvent,
    ) -> Result<Notification, PersistenceError> {
        let notification = event.to_notification(organization_id);
        self.store.create(&notification).await?;
        tracing::debug!(
            tenant = %organization_id,
            kind = notification.kind.as_str(),
            "Notification emitted"
        );
        Ok(notification)
    }

    /// Emit every event, logging failures; returns how many were written
    pub async fn emit_all(&self, organization_id: &str, events: &[NotificationEvent]) -> usize {
        let mut emitted = 0;
        for event in events {
            match self.emit(organization_id, event).await {
                Ok(_) => emitted += 1,
                Err(e) => tracing::warn!(
                    tenant = %organization_id,
                    kind = event.kind().as_str(),
                    error = %e,
                    "Failed to emit notification"
                ),
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_persistence::InMemoryNotificationStore;

    #[tokio::test]
    async fn test_emit_all_writes_each_event() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let emitter = NotificationEmitter::new(store.clone());

        let events = vec![
            NotificationEvent::CheckedIn {
                phone: "+1".to_string(),
                checkin_id: "CHK-abcdefgh".to_string(),
            },
            NotificationEvent::Registered {
                phone: "+1".to_string(),
                name: "Asha".to_string(),
            },
        ];
        assert_eq!(emitter.emit_all("acme", &events).await, 2);

        let stored = store.list("acme", true, 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        let checkin = stored
            .iter()
            .find(|n| n.kind == NotificationKind::CheckIn)
            .unwrap();
        assert_eq!(checkin.refs.get("checkin_id").map(String::as_str), Some("CHK-abcdefgh"));
        assert_eq!(checkin.from, "+1");
    }

    #[test]
    fn test_appointment_message_without_doctor() {
        let event = NotificationEvent::AppointmentCreated {
            phone: "+1".to_string(),
            appointment_id: "APT-1".to_string(),
            patient_name: "Ravi".to_string(),
            doctor_name: None,
            date: "2024-05-01".to_string(),
            time: "10:00".to_string(),
        };
        let notification = event.to_notification("acme");
        assert!(notification.message.contains("any doctor"));
        assert_eq!(notification.kind, NotificationKind::Appointment);
    }
}
