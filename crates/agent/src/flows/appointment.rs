//! Appointment booking

use careline_core::{generate_flow_token, Appointment, Contact, Organization, Patient, Relation};
use careline_persistence::AppointmentStore;
use careline_tools::{AppointmentAction, AppointmentForm, FormPayload};

use super::FlowOutcome;
use crate::messenger::OutboundMessage;
use crate::notify::NotificationEvent;
use crate::{metrics, AgentError};

pub const FORM_SENT: &str =
    "I've sent you the appointment form. Please fill it in and we'll get you booked.";
pub const RESCHEDULE_UNAVAILABLE: &str =
    "Rescheduling over WhatsApp isn't available yet. Please call the front desk to change your appointment.";
pub const CANCEL_UNAVAILABLE: &str =
    "Cancelling over WhatsApp isn't available yet. Please call the front desk to cancel your appointment.";
pub const USAGE: &str =
    "I can book a new appointment, or help you reschedule or cancel one. What would you like to do?";

/// Handle the `appointment_flow` intent
pub fn start(organization: &Organization, action: &AppointmentAction) -> FlowOutcome {
    match action {
        AppointmentAction::New => match &organization.flows.appointment {
            Some(flow_id) => FlowOutcome::reply(FORM_SENT).with_prompt(OutboundMessage::Flow {
                flow_id: flow_id.clone(),
                flow_token: generate_flow_token(),
                body: format!("Book an appointment at {}", organization.name),
                cta: "Book appointment".to_string(),
            }),
            None => {
                tracing::warn!(tenant = %organization.id, "No appointment flow configured");
                FlowOutcome::reply(format!(
                    "Online booking isn't set up for {} yet. Please call the front desk to book.",
                    organization.name
                ))
            }
        },
        AppointmentAction::Reschedule => FlowOutcome::reply(RESCHEDULE_UNAVAILABLE),
        AppointmentAction::Cancel => FlowOutcome::reply(CANCEL_UNAVAILABLE),
        AppointmentAction::Unknown(action) => {
            tracing::debug!(tenant = %organization.id, %action, "Unknown appointment action");
            FlowOutcome::reply(USAGE)
        }
    }
}

/// Persist a submitted appointment form as a draft appointment
pub async fn submit(
    store: &dyn AppointmentStore,
    organization: &Organization,
    contact: &mut Contact,
    payload: &FormPayload,
) -> Result<FlowOutcome, AgentError> {
    let form = AppointmentForm::from(payload);
    let flow_token = payload.flow_token.clone().unwrap_or_else(generate_flow_token);

    let doctor_name = organization.doctor(&form.doctor_id).map(|d| d.name.clone());
    if doctor_name.is_none() {
        tracing::warn!(
            tenant = %organization.id,
            doctor_id = %form.doctor_id,
            "Appointment references unknown doctor"
        );
    }

    let patient_name = if form.patient_name.is_empty() {
        contact.name.clone()
    } else {
        form.patient_name.clone()
    };

    let appointment = Appointment {
        doctor_id: form.doctor_id.clone(),
        doctor_name: doctor_name.clone(),
        patient_name: patient_name.clone(),
        patient_age: form.patient_age,
        patient_gender: form.patient_gender,
        specialty: form.specialty.clone(),
        date: form.date.clone(),
        time: form.time.clone(),
        reason: form.reason.clone(),
        ..Appointment::draft(&organization.id, &contact.phone, flow_token)
    };
    store.create(&appointment).await?;
    metrics::record_created("appointment");
    tracing::info!(
        tenant = %organization.id,
        appointment_id = %appointment.id,
        "Draft appointment created"
    );

    if !contact.has_patient(&patient_name) {
        let mut patient = Patient::new(
            patient_name.clone(),
            Relation::between(&patient_name, &contact.name),
        );
        patient.age = form.patient_age;
        patient.gender = form.patient_gender;
        contact.patients.push(patient);
    }

    let reply = format!(
        "Thank you! Your appointment request {} for {} with {} on {} at {} has been received. \
         We'll confirm it shortly.",
        appointment.id,
        patient_name,
        doctor_name.as_deref().unwrap_or("the next available doctor"),
        appointment.date,
        appointment.time
    );

    Ok(FlowOutcome::reply(reply).with_event(NotificationEvent::AppointmentCreated {
        phone: contact.phone.clone(),
        appointment_id: appointment.id,
        patient_name,
        doctor_name,
        date: appointment.date,
        time: appointment.time,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::{AppointmentStatus, Doctor};
    use careline_persistence::InMemoryAppointmentStore;
    use serde_json::json;

    fn clinic() -> Organization {
        let mut org = Organization::new("acme", "Acme Clinic")
            .with_doctor(Doctor::new("doc-1", "Dr. Rao", &["Cardiologist"]));
        org.flows.appointment = Some("flow-apt".to_string());
        org
    }

    #[test]
    fn test_start_new_sends_flow_with_token() {
        let outcome = start(&clinic(), &AppointmentAction::New);
        assert_eq!(outcome.reply.as_deref(), Some(FORM_SENT));
        match &outcome.prompts[..] {
            [OutboundMessage::Flow { flow_id, flow_token, .. }] => {
                assert_eq!(flow_id, "flow-apt");
                assert_eq!(flow_token.len(), 6);
                assert!(flow_token.chars().all(|c| c.is_ascii_digit()));
            }
            other => panic!("unexpected prompts {:?}", other),
        }
    }

    #[test]
    fn test_start_placeholders() {
        let org = clinic();
        assert_eq!(start(&org, &AppointmentAction::Reschedule).reply.as_deref(), Some(RESCHEDULE_UNAVAILABLE));
        assert_eq!(start(&org, &AppointmentAction::Cancel).reply.as_deref(), Some(CANCEL_UNAVAILABLE));
        assert_eq!(
            start(&org, &AppointmentAction::Unknown("move".to_string())).reply.as_deref(),
            Some(USAGE)
        );
        assert!(start(&org, &AppointmentAction::Cancel).prompts.is_empty());
    }

    #[tokio::test]
    async fn test_submit_creates_draft_and_patient() {
        let store = InMemoryAppointmentStore::new();
        let org = clinic();
        let mut contact = Contact::new("acme", "+1", "Priya");
        let payload = FormPayload::from_value(&json!({
            "screen_0_Patient_Name_0": "Ravi",
            "screen_0_Age_1": "8",
            "screen_0_Gender_2": "0_Male",
            "screen_0_Doctor_3": "doc-1",
            "screen_1_Date_0": "2024-05-01",
            "screen_1_Time_1": "10:30",
            "flow_token": "123456"
        }))
        .unwrap();

        let outcome = submit(&store, &org, &mut contact, &payload).await.unwrap();

        let stored = store.find_by_flow_token("acme", "123456").await.unwrap().unwrap();
        assert!(stored.id.starts_with("APT-"));
        assert_eq!(stored.id.len(), 12);
        assert_eq!(stored.status, AppointmentStatus::Draft);
        assert_eq!(stored.doctor_name.as_deref(), Some("Dr. Rao"));
        assert_eq!(outcome.events.len(), 1);

        assert_eq!(contact.patients.len(), 2);
        let ravi = contact.patients.iter().find(|p| p.name == "Ravi").unwrap();
        assert_eq!(ravi.relation, Relation::Other);
        assert_eq!(ravi.age, Some(8));

        // same patient again is not duplicated
        submit(&store, &org, &mut contact, &payload).await.unwrap();
        assert_eq!(contact.patients.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_doctor_does_not_abort() {
        let store = InMemoryAppointmentStore::new();
        let mut contact = Contact::new("acme", "+1", "Priya");
        let payload = FormPayload::from_value(&json!({
            "screen_0_Patient_Name_0": "priya",
            "screen_0_Doctor_0": "doc-missing"
        }))
        .unwrap();

        let outcome = submit(&store, &clinic(), &mut contact, &payload).await.unwrap();
        assert!(outcome.reply.unwrap().contains("next available doctor"));

        let stored = store.list_for_contact("acme", "+1").await.unwrap();
        assert_eq!(stored[0].doctor_name, None);
        // case-insensitive match on the contact's own name
        let priya = contact.patients.iter().find(|p| p.name == "priya").unwrap();
        assert_eq!(priya.relation, Relation::SelfRelation);
    }
}
