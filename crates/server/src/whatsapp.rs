//! WhatsApp Cloud (Graph) API messenger

use std::time::Duration;

use async_trait::async_trait;
use careline_agent::messenger::FLOW_ENTRY_SCREEN;
use careline_agent::{Messenger, MessengerError, OutboundMessage};
use careline_config::WhatsAppConfig;
use careline_core::Organization;
use serde_json::{json, Value};

use crate::ServerError;

/// Sends messages with each tenant's own access token and phone-number-id
pub struct WhatsAppMessenger {
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppMessenger {
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Message envelope for `POST /<version>/<phone_number_id>/messages`
    pub fn payload(to: &str, message: &OutboundMessage) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
        });

        match message {
            OutboundMessage::Text(body) => {
                payload["type"] = json!("text");
                payload["text"] = json!({ "preview_url": false, "body": body });
            }
            OutboundMessage::Template {
                name,
                language,
                parameters,
            } => {
                let mut template = json!({
                    "name": name,
                    "language": { "code": language },
                });
                if !parameters.is_empty() {
                    let parameters: Vec<Value> = parameters
                        .iter()
                        .map(|p| json!({ "type": "text", "text": p }))
                        .collect();
                    template["components"] = json!([{ "type": "body", "parameters": parameters }]);
                }
                payload["type"] = json!("template");
                payload["template"] = template;
            }
            OutboundMessage::Flow {
                flow_id,
                flow_token,
                body,
                cta,
            } => {
                payload["type"] = json!("interactive");
                payload["interactive"] = json!({
                    "type": "flow",
                    "body": { "text": body },
                    "action": {
                        "name": "flow",
                        "parameters": {
                            "flow_message_version": "3",
                            "flow_token": flow_token,
                            "flow_id": flow_id,
                            "flow_cta": cta,
                            "flow_action": "navigate",
                            "flow_action_payload": { "screen": FLOW_ENTRY_SCREEN },
                        }
                    }
                });
            }
        }
        payload
    }

    /// Reads the tenant's phone number object to prove token and id work
    pub async fn check(&self, organization: &Organization) -> Result<(), MessengerError> {
        if !organization.whatsapp.is_complete() {
            return Err(MessengerError::MissingCredentials(organization.id.clone()));
        }
        let url = format!(
            "{}/{}/{}",
            self.config.graph_api_base.trim_end_matches('/'),
            self.config.api_version,
            organization.whatsapp.phone_number_id
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(&organization.whatsapp.access_token)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl Messenger for WhatsAppMessenger {
    async fn send(
        &self,
        organization: &Organization,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<(), MessengerError> {
        if !organization.whatsapp.is_complete() {
            return Err(MessengerError::MissingCredentials(organization.id.clone()));
        }

        let response = self
            .http
            .post(self.config.messages_url(&organization.whatsapp.phone_number_id))
            .bearer_auth(&organization.whatsapp.access_token)
            .json(&Self::payload(to, message))
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;

        tracing::debug!(tenant = %organization.id, to, kind = message.kind().as_str(), "WhatsApp message sent");
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> MessengerError {
    if err.is_timeout() {
        MessengerError::Timeout
    } else {
        MessengerError::Network(err.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), MessengerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(MessengerError::Api {
        status: status.as_u16(),
        message,
    })
}
