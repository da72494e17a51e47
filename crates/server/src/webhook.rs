//! WhatsApp webhook: subscription verification and message delivery
//!
//! Deliveries are always acknowledged unless the engine fails before a
//! response is committed. The provider retries anything that is not a 2xx,
//! so malformed bodies and unknown tenants still get a 200.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use careline_agent::{
    AgentError, ChatEngine, EventOutcome, InboundContent, InboundEvent, InboundMessage,
    TenantRequest,
};
use careline_core::MessageKind;
use serde::Deserialize;
use serde_json::json;

use crate::metrics::record_webhook_event;
use crate::state::AppState;
use crate::ServerError;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WaMessage>,
    #[serde(default)]
    pub contacts: Vec<WaContact>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WaContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WaMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
    #[serde(default)]
    pub image: Option<Media>,
    #[serde(default)]
    pub video: Option<Media>,
    #[serde(default)]
    pub audio: Option<Media>,
    #[serde(default)]
    pub document: Option<Media>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Interactive {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub nfm_reply: Option<NfmReply>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NfmReply {
    #[serde(default)]
    pub response_json: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl WaMessage {
    fn content(&self) -> InboundContent {
        let media = |kind: MessageKind, media: &Option<Media>| InboundContent::Media {
            kind,
            caption: media.as_ref().and_then(|m| m.caption.clone()),
            media_id: media.as_ref().and_then(|m| m.id.clone()),
        };

        match self.kind.as_str() {
            "text" => InboundContent::Text(
                self.text.as_ref().map(|t| t.body.clone()).unwrap_or_default(),
            ),
            "interactive" => match &self.interactive {
                Some(Interactive {
                    nfm_reply: Some(reply),
                    ..
                }) => InboundContent::FormReply {
                    response_json: reply.response_json.clone(),
                },
                Some(other) => InboundContent::Unsupported(format!("interactive:{}", other.kind)),
                None => InboundContent::Unsupported("interactive".to_string()),
            },
            "image" => media(MessageKind::Image, &self.image),
            "video" => media(MessageKind::Video, &self.video),
            "audio" => media(MessageKind::Audio, &self.audio),
            "document" => media(MessageKind::Document, &self.document),
            other => InboundContent::Unsupported(other.to_string()),
        }
    }
}

impl WebhookEnvelope {
    /// One engine event per change; each change names its own phone-number-id
    pub fn into_events(self, hints: &TenantRequest) -> Vec<InboundEvent> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.changes)
            .filter(|change| !change.value.messages.is_empty())
            .map(|change| {
                let value = change.value;
                let profile_name = |from: &str| {
                    value
                        .contacts
                        .iter()
                        .find(|c| c.wa_id == from)
                        .or(value.contacts.first())
                        .and_then(|c| c.profile.as_ref())
                        .map(|p| p.name.clone())
                        .filter(|n| !n.trim().is_empty())
                };

                let messages = value
                    .messages
                    .iter()
                    .filter(|m| !m.from.is_empty())
                    .map(|m| InboundMessage {
                        id: m.id.clone(),
                        from: m.from.clone(),
                        profile_name: profile_name(&m.from),
                        content: m.content(),
                    })
                    .collect();

                InboundEvent {
                    tenant: TenantRequest {
                        phone_number_id: value
                            .metadata
                            .as_ref()
                            .map(|m| m.phone_number_id.clone())
                            .filter(|id| !id.is_empty()),
                        ..hints.clone()
                    },
                    messages,
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /webhook` subscription handshake
pub async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    let (Some(mode), Some(token), Some(challenge)) =
        (params.mode, params.verify_token, params.challenge)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing hub.mode, hub.verify_token or hub.challenge" })),
        )
            .into_response();
    };

    let token_ok = match state.config.whatsapp.verify_token.as_deref() {
        Some(expected) => token == expected,
        None => true,
    };

    if mode == "subscribe" && token_ok {
        tracing::info!("Webhook verified");
        return (StatusCode::OK, challenge).into_response();
    }

    tracing::warn!(%mode, "Webhook verification rejected");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "verification failed" })),
    )
        .into_response()
}

fn tenant_hints(state: &AppState, headers: &HeaderMap, query: &HashMap<String, String>) -> TenantRequest {
    let tenancy = &state.config.tenancy;
    TenantRequest {
        header: headers
            .get(tenancy.tenant_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        query: query.get(&tenancy.tenant_query_param).cloned(),
        phone_number_id: None,
    }
}

fn outcome_label(outcome: EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Processed(_) => "processed",
        EventOutcome::TenantNotFound | EventOutcome::TenantInactive => "dropped",
    }
}

/// `POST /webhook` message delivery
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook body");
            record_webhook_event("malformed");
            return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
        }
    };

    let hints = tenant_hints(&state, &headers, &query);
    let events = envelope.into_events(&hints);

    let engine = state.engine.clone();
    let slow_after = Duration::from_secs(state.config.timeouts.event_secs);

    // Engine work runs on its own task so a dropped request never cuts a turn
    // short; each LLM and outbound call carries its own deadline
    if state.config.webhook.async_processing {
        tokio::spawn(async move {
            for event in &events {
                let _ = run_event(&engine, event, slow_after).await;
            }
        });
        return (StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response();
    }

    let task = tokio::spawn(async move {
        for event in &events {
            run_event(&engine, event, slow_after).await?;
        }
        Ok::<(), AgentError>(())
    });
    match task.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Ok(Err(e)) => ServerError::from(e).into_response(),
        Err(e) => ServerError::Internal(e.to_string()).into_response(),
    }
}

async fn run_event(
    engine: &ChatEngine,
    event: &InboundEvent,
    slow_after: Duration,
) -> Result<EventOutcome, AgentError> {
    let started = Instant::now();
    let result = engine.handle_event(event).await;
    match &result {
        Ok(outcome) => record_webhook_event(outcome_label(*outcome)),
        Err(e) => {
            record_webhook_event("failed");
            tracing::error!(error = %e, "Webhook event failed");
        }
    }

    let elapsed = started.elapsed();
    if elapsed > slow_after {
        tracing::warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_secs = slow_after.as_secs(),
            "Slow webhook event"
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(value: serde_json::Value) -> WebhookEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_message_event() {
        let events = envelope(json!({
            "object": "whatsapp_business_account",
            "entry": [{ "changes": [{ "value": {
                "metadata": { "phone_number_id": "pn-1" },
                "contacts": [{ "wa_id": "100", "profile": { "name": "Priya" } }],
                "messages": [{ "id": "wamid.1", "from": "100", "type": "text", "text": { "body": "hi" } }]
            }}]}]
        }))
        .into_events(&TenantRequest {
            header: Some("acme".to_string()),
            ..TenantRequest::default()
        });

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tenant.phone_number_id.as_deref(), Some("pn-1"));
        assert_eq!(events[0].tenant.header.as_deref(), Some("acme"));
        let message = &events[0].messages[0];
        assert_eq!(message.profile_name.as_deref(), Some("Priya"));
        assert_eq!(message.content, InboundContent::Text("hi".to_string()));
    }

    #[test]
    fn test_message_kinds() {
        let events = envelope(json!({
            "entry": [{ "changes": [{ "value": {
                "messages": [
                    { "from": "1", "type": "interactive", "interactive": {
                        "type": "nfm_reply",
                        "nfm_reply": { "response_json": "{\"flow_token\":\"1\"}" }
                    }},
                    { "from": "1", "type": "image", "image": { "id": "m1", "caption": "scan" } },
                    { "from": "1", "type": "sticker" }
                ]
            }}]}]
        }))
        .into_events(&TenantRequest::default());

        let contents: Vec<_> = events[0].messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(
            contents[0],
            InboundContent::FormReply {
                response_json: "{\"flow_token\":\"1\"}".to_string()
            }
        );
        assert_eq!(
            contents[1],
            InboundContent::Media {
                kind: MessageKind::Image,
                caption: Some("scan".to_string()),
                media_id: Some("m1".to_string()),
            }
        );
        assert_eq!(contents[2], InboundContent::Unsupported("sticker".to_string()));
    }

    #[test]
    fn test_status_only_changes_produce_no_events() {
        let events = envelope(json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{ "id": "x" }] } }] }]
        }))
        .into_events(&TenantRequest::default());
        assert!(events.is_empty());
    }
}
