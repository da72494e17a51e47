//! Contact registration

use careline_core::{Contact, Organization, Patient, Relation};
use careline_tools::{FormPayload, RegistrationForm};

use super::FlowOutcome;
use crate::notify::NotificationEvent;
use crate::AgentError;

/// Apply a registration form to the contact and its self patient
///
/// The contact is saved by the caller along with the rest of the turn.
pub fn submit(
    organization: &Organization,
    contact: &mut Contact,
    payload: &FormPayload,
) -> Result<FlowOutcome, AgentError> {
    let form = RegistrationForm::from(payload);

    if !form.full_name.is_empty() {
        contact.name = form.full_name.clone();
    }
    contact.registered = true;

    let name = contact.name.clone();
    match contact.self_patient_mut() {
        Some(patient) => {
            patient.name = name.clone();
            patient.age = form.age.or(patient.age);
            patient.gender = form.gender.or(patient.gender);
            patient.date_of_birth = form.date_of_birth.or(patient.date_of_birth.take());
        }
        None => {
            let mut patient = Patient::new(name.clone(), Relation::SelfRelation);
            patient.age = form.age;
            patient.gender = form.gender;
            patient.date_of_birth = form.date_of_birth;
            contact.patients.push(patient);
        }
    }

    tracing::info!(tenant = %organization.id, phone = %contact.phone, "Contact registered");

    Ok(FlowOutcome::reply(format!(
        "Thanks {}, you're registered with {}.",
        name, organization.name
    ))
    .with_event(NotificationEvent::Registered {
        phone: contact.phone.clone(),
        name,
    }))
}
