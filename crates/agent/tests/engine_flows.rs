//! End-to-end engine tests over in-memory stores, a scripted LLM and a
//! recording messenger.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use careline_agent::{
    ChatEngine, EngineComponents, EventOutcome, InboundContent, InboundEvent, InboundMessage,
    OutboundMessage, RecordingMessenger, TenantRequest,
};
use careline_config::Settings;
use careline_core::{Appointment, GenerateRequest, GenerateResponse, Organization, ToolCall};
use careline_llm::{LlmBackend, LlmError, ScriptedBackend};
use careline_persistence::{InMemoryOrganizationStore, PersistenceLayer};
use serde_json::json;

struct Harness {
    engine: ChatEngine,
    stores: PersistenceLayer,
    llm: Arc<ScriptedBackend>,
    messenger: Arc<RecordingMessenger>,
    _knowledge_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let acme = Organization::new("Acme", "Acme Clinic").with_credentials("token-a", "pn-acme");
    let other = Organization::new("Other", "Other Hospital").with_credentials("token-o", "pn-other");
    let stores = PersistenceLayer::in_memory_with(Arc::new(
        InMemoryOrganizationStore::with_organizations([acme, other]),
    ));

    let knowledge_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        knowledge_dir.path().join("Acme.txt"),
        "Acme Clinic\nVisiting hours: 9am-5pm\nParking is free for patients\n",
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.knowledge.directory = knowledge_dir.path().display().to_string();

    let llm = Arc::new(ScriptedBackend::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let components =
        EngineComponents::new(&settings, stores.clone(), llm.clone(), messenger.clone());

    Harness {
        engine: ChatEngine::new(&settings, components).unwrap(),
        stores,
        llm,
        messenger,
        _knowledge_dir: knowledge_dir,
    }
}

fn event(phone_number_id: &str, from: &str, content: InboundContent) -> InboundEvent {
    InboundEvent {
        tenant: TenantRequest::from_phone_number_id(phone_number_id),
        messages: vec![InboundMessage {
            id: "wamid.1".to_string(),
            from: from.to_string(),
            profile_name: Some("Priya".to_string()),
            content,
        }],
    }
}

fn text(body: &str) -> InboundContent {
    InboundContent::Text(body.to_string())
}

fn texts(messages: &[OutboundMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::Text(body) => Some(body.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn checkin_command_for_matching_tenant() {
    let h = harness();
    h.engine.handle_event(&event("pn-acme", "+100", text("hello"))).await.unwrap();
    let llm_calls = h.llm.call_count();
    let sent_before = h.messenger.sent_to("+100").len();

    let outcome = h
        .engine
        .handle_event(&event("pn-acme", "+100", text("Checkin:Acme")))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::Processed(1));

    assert_eq!(h.stores.checkins.list("Acme").await.unwrap().len(), 1);
    let notifications = h.stores.notifications.list("Acme", false, 50).await.unwrap();
    let checkins: Vec<_> = notifications
        .iter()
        .filter(|n| n.refs.contains_key("checkin_id"))
        .collect();
    assert_eq!(checkins.len(), 1);

    let sent = h.messenger.sent_to("+100");
    assert_eq!(sent.len(), sent_before + 1);
    assert!(texts(&sent[sent_before..])[0].contains("Acme Clinic"));
    assert_eq!(h.llm.call_count(), llm_calls);
}

#[tokio::test]
async fn checkin_command_for_other_tenant_falls_through() {
    let h = harness();
    h.llm.push(Ok(GenerateResponse::text("How can I help?")));

    h.engine
        .handle_event(&event("pn-other", "+100", text("Checkin:Acme")))
        .await
        .unwrap();

    assert!(h.stores.checkins.list("Other").await.unwrap().is_empty());
    assert!(h.stores.checkins.list("Acme").await.unwrap().is_empty());
    assert_eq!(h.llm.call_count(), 1);
    assert!(texts(&h.messenger.sent_to("+100")).contains(&"How can I help?".to_string()));
}

#[tokio::test]
async fn same_phone_in_two_tenants_is_two_contacts() {
    let h = harness();
    h.engine.handle_event(&event("pn-acme", "+100", text("hi"))).await.unwrap();
    h.engine.handle_event(&event("pn-other", "+100", text("hi"))).await.unwrap();

    let both = h.stores.contacts.find_by_phone("+100", None).await.unwrap();
    assert_eq!(both.len(), 2);
    let acme = h.stores.contacts.get("Acme", "+100").await.unwrap().unwrap();
    let other = h.stores.contacts.get("Other", "+100").await.unwrap().unwrap();
    assert_eq!(acme.history.len(), 3);
    assert_eq!(other.history.len(), 3);
    assert_eq!(h.stores.contacts.messages("Acme", "+100", 100).await.unwrap().len(), 3);
}

#[tokio::test]
async fn welcome_sent_once() {
    let h = harness();
    h.engine.handle_event(&event("pn-acme", "+100", text("hi"))).await.unwrap();
    h.engine.handle_event(&event("pn-acme", "+100", text("again"))).await.unwrap();

    let welcomes = h
        .messenger
        .sent_to("+100")
        .into_iter()
        .filter(|m| matches!(m, OutboundMessage::Text(body) if body.starts_with("Welcome to Acme Clinic")))
        .count();
    assert_eq!(welcomes, 1);
    assert_eq!(h.stores.contacts.list("Acme").await.unwrap().len(), 1);
}

#[tokio::test]
async fn knowledge_lookup_uses_matching_line() {
    let h = harness();
    h.llm.push(Ok(GenerateResponse::tool_call(ToolCall::new(
        "call_1",
        "knowledge_lookup",
        r#"{"query":"visiting hours"}"#,
    ))));
    h.llm.push(Ok(GenerateResponse::text("Visitors are welcome from 9am to 5pm.")));

    h.engine
        .handle_event(&event("pn-acme", "+100", text("When can I visit?")))
        .await
        .unwrap();

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    let summary_prompt = &requests[1].messages.last().unwrap().content;
    assert!(summary_prompt.contains("Visiting hours: 9am-5pm"));
    assert!(!summary_prompt.contains("Parking"));

    let replies = texts(&h.messenger.sent_to("+100"));
    assert_eq!(replies.last().unwrap(), "Visitors are welcome from 9am to 5pm.");

    let contact = h.stores.contacts.get("Acme", "+100").await.unwrap().unwrap();
    assert_eq!(
        contact.history.last().unwrap().content,
        "Visitors are welcome from 9am to 5pm."
    );
}

#[tokio::test]
async fn feedback_matches_flow_token_exactly() {
    let h = harness();
    let appointment = Appointment::draft("Acme", "+100", "123456");
    h.stores.appointments.create(&appointment).await.unwrap();

    let submit = |token: &str| {
        InboundContent::FormReply {
            response_json: json!({
                "screen_0_Choose_0": "0_Yes",
                "screen_0_Doctor_Rating_1": "(4/5)",
                "flow_token": token
            })
            .to_string(),
        }
    };

    h.engine
        .handle_event(&event("pn-acme", "+100", submit("654321")))
        .await
        .unwrap();
    let stored = h.stores.appointments.get("Acme", &appointment.id).await.unwrap().unwrap();
    assert!(stored.feedback.is_none());

    h.engine
        .handle_event(&event("pn-acme", "+100", submit("123456")))
        .await
        .unwrap();
    let stored = h.stores.appointments.get("Acme", &appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.feedback.unwrap().doctor_rating, Some(4));
}

#[tokio::test]
async fn registration_form_wins_over_other_markers() {
    let h = harness();
    let payload = json!({
        "screen_0_Full_Name_0": "Priya Sharma",
        "screen_0_Choose_1": "0_Yes",
        "screen_0_Description_of_issue_2": "billing"
    });

    h.engine
        .handle_event(&event(
            "pn-acme",
            "+100",
            InboundContent::FormReply {
                response_json: payload.to_string(),
            },
        ))
        .await
        .unwrap();

    let contact = h.stores.contacts.get("Acme", "+100").await.unwrap().unwrap();
    assert!(contact.registered);
    assert_eq!(contact.name, "Priya Sharma");
    assert!(h.stores.tickets.list("Acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tenant_is_dropped() {
    let h = harness();
    let outcome = h
        .engine
        .handle_event(&event("pn-missing", "+100", text("hi")))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::TenantNotFound);
    assert!(h.messenger.sent().is_empty());
}

#[tokio::test]
async fn bot_disabled_contact_gets_transcript_only() {
    let h = harness();
    h.engine.handle_event(&event("pn-acme", "+100", text("hi"))).await.unwrap();
    let mut contact = h.stores.contacts.get("Acme", "+100").await.unwrap().unwrap();
    contact.bot_enabled = false;
    h.stores.contacts.save(&contact).await.unwrap();
    let sent_before = h.messenger.sent().len();
    let calls_before = h.llm.call_count();

    h.engine.handle_event(&event("pn-acme", "+100", text("anyone?"))).await.unwrap();

    assert_eq!(h.messenger.sent().len(), sent_before);
    assert_eq!(h.llm.call_count(), calls_before);
    let transcript = h.stores.contacts.messages("Acme", "+100", 100).await.unwrap();
    assert_eq!(transcript.last().unwrap().body, "anyone?");
}

/// Picks symptom assessment, then stalls on every specialty classification
struct SlowClassifier {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmBackend for SlowClassifier {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(GenerateResponse::tool_call(ToolCall::new(
                "call_1",
                "symptom_assessment",
                r#"{"symptoms":"headache, fever, back pain"}"#,
            )));
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(GenerateResponse::text("Neurologist"))
    }

    fn model_name(&self) -> &str {
        "slow-classifier"
    }
}

#[tokio::test]
async fn slow_classification_still_replies_and_saves_turn() {
    let acme = Organization::new("Acme", "Acme Clinic").with_credentials("token-a", "pn-acme");
    let stores = PersistenceLayer::in_memory_with(Arc::new(
        InMemoryOrganizationStore::with_organizations([acme]),
    ));
    let mut settings = Settings::default();
    settings.timeouts.llm_secs = 1;
    settings.timeouts.event_secs = 2;

    let messenger = Arc::new(RecordingMessenger::new());
    let llm = Arc::new(SlowClassifier {
        calls: AtomicUsize::new(0),
    });
    let components = EngineComponents::new(&settings, stores.clone(), llm, messenger.clone());
    let engine = ChatEngine::new(&settings, components).unwrap();

    let outcome = engine
        .handle_event(&event("pn-acme", "+100", text("I feel unwell")))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::Processed(1));

    // Every fragment fell back to the default specialty
    let replies = texts(&messenger.sent_to("+100"));
    let triage = replies.last().unwrap();
    assert_eq!(triage.matches("we suggest a General Physician").count(), 3);

    let contact = stores.contacts.get("Acme", "+100").await.unwrap().unwrap();
    assert_eq!(contact.history.len(), 3);
    assert_eq!(&contact.history.last().unwrap().content, triage);
}
