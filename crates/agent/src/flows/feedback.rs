//! Post-visit feedback

use careline_core::{Contact, Organization};
use careline_persistence::AppointmentStore;
use careline_tools::{FeedbackForm, FormPayload};
use chrono::Utc;

use super::FlowOutcome;
use crate::notify::NotificationEvent;
use crate::AgentError;

pub const THANKS: &str = "Thank you for your feedback! It helps us improve our care.";

/// Attach feedback to the appointment that issued the flow token
///
/// A missing token or one that matches no appointment is logged and
/// ignored without replying.
pub async fn submit(
    store: &dyn AppointmentStore,
    organization: &Organization,
    contact: &Contact,
    payload: &FormPayload,
) -> Result<FlowOutcome, AgentError> {
    let Some(token) = payload.flow_token.as_deref() else {
        tracing::warn!(tenant = %organization.id, phone = %contact.phone, "Feedback without flow token");
        return Ok(FlowOutcome::silent());
    };

    let Some(appointment) = store.find_by_flow_token(&organization.id, token).await? else {
        tracing::warn!(
            tenant = %organization.id,
            phone = %contact.phone,
            flow_token = token,
            "Feedback for unknown flow token"
        );
        return Ok(FlowOutcome::silent());
    };

    let feedback = FeedbackForm::from(payload).into_feedback(Utc::now());
    store
        .attach_feedback(&organization.id, &appointment.id, &feedback)
        .await?;
    tracing::info!(
        tenant = %organization.id,
        appointment_id = %appointment.id,
        "Feedback attached"
    );

    Ok(FlowOutcome::reply(THANKS).with_event(NotificationEvent::FeedbackReceived {
        phone: contact.phone.clone(),
        appointment_id: appointment.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::Appointment;
    use careline_persistence::InMemoryAppointmentStore;
    use serde_json::json;

    fn payload(token: &str) -> FormPayload {
        FormPayload::from_value(&json!({
            "screen_0_Choose_0": "0_Yes",
            "screen_0_Comments_1": "Very kind staff",
            "screen_0_Doctor_Rating_2": "★★★★★ (5/5)",
            "flow_token": token
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_feedback_attaches_by_token() {
        let store = InMemoryAppointmentStore::new();
        let apt = Appointment::draft("acme", "+1", "777777");
        store.create(&apt).await.unwrap();
        let org = Organization::new("acme", "Acme Clinic");
        let contact = Contact::new("acme", "+1", "Priya");

        let outcome = submit(&store, &org, &contact, &payload("777777")).await.unwrap();
        assert_eq!(outcome.reply.as_deref(), Some(THANKS));

        let stored = store.get("acme", &apt.id).await.unwrap().unwrap();
        let feedback = stored.feedback.unwrap();
        assert_eq!(feedback.recommend, Some(true));
        assert_eq!(feedback.doctor_rating, Some(5));
        assert_eq!(feedback.comments, "Very kind staff");
    }

    #[tokio::test]
    async fn test_mismatched_token_is_ignored() {
        let store = InMemoryAppointmentStore::new();
        let apt = Appointment::draft("acme", "+1", "777777");
        store.create(&apt).await.unwrap();
        let org = Organization::new("acme", "Acme Clinic");
        let contact = Contact::new("acme", "+1", "Priya");

        let outcome = submit(&store, &org, &contact, &payload("000000")).await.unwrap();
        assert_eq!(outcome, FlowOutcome::silent());
        assert!(store.get("acme", &apt.id).await.unwrap().unwrap().feedback.is_none());
    }
}
