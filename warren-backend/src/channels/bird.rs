//! Bird SMS channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::channels::{BirdMeta, InboundMessage, MessageKind, MessageProvider, ProviderMetadata};
use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct BirdWebhook {
    payload: BirdPayload,
}

#[derive(Debug, Deserialize)]
struct BirdPayload {
    sender: BirdSender,
    #[serde(rename = "channelId")]
    channel_id: String,
    body: BirdBody,
}

#[derive(Debug, Deserialize)]
struct BirdSender {
    contact: BirdContact,
}

#[derive(Debug, Deserialize)]
struct BirdContact {
    #[serde(rename = "identifierValue")]
    identifier_value: String,
}

#[derive(Debug, Deserialize)]
struct BirdBody {
    text: BirdText,
}

#[derive(Debug, Deserialize)]
struct BirdText {
    text: String,
}

/// Parse a Bird webhook event into the provider-neutral form.
pub fn parse_event(body: &Value) -> Result<InboundMessage> {
    let event: BirdWebhook = serde_json::from_value(body.clone())
        .map_err(|e| Error::Parsing(format!("invalid Bird event: {}", e)))?;

    let phone = event.payload.sender.contact.identifier_value;

    Ok(InboundMessage {
        text: event.payload.body.text.text,
        kind: MessageKind::Text,
        metadata: ProviderMetadata::Bird(BirdMeta {
            user_name: format!("Bird User {}", phone_suffix(&phone)),
            phone_number: phone,
            channel_id: event.payload.channel_id,
        }),
    })
}

/// Last four characters of the identifier. Counted in chars, not bytes,
/// since the value is attacker-controlled and need not be ASCII.
fn phone_suffix(phone: &str) -> String {
    let skip = phone.chars().count().saturating_sub(4);
    phone.chars().skip(skip).collect()
}

pub struct BirdChannel {
    client: Client,
    api_url: String,
    organization_id: String,
    workspace_id: String,
    api_key: String,
    signing_key: String,
    channel_id: String,
    user_phone: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    results: Option<Vec<Subscription>>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    id: String,
    url: String,
}

impl BirdChannel {
    pub fn new(config: &Config, channel_id: &str, user_phone: &str) -> Self {
        BirdChannel {
            client: Client::new(),
            api_url: config.bird_api_url.clone(),
            organization_id: config.bird_organization_id.clone(),
            workspace_id: config.bird_workspace_id.clone(),
            api_key: config.bird_api_key.clone(),
            signing_key: config.bird_signing_key.clone(),
            channel_id: channel_id.to_string(),
            user_phone: user_phone.to_string(),
        }
    }

    fn subscriptions_url(&self) -> String {
        format!(
            "{}/organizations/{}/workspaces/{}/webhook-subscriptions",
            self.api_url, self.organization_id, self.workspace_id
        )
    }

    fn auth_header(&self) -> String {
        format!("AccessKey {}", self.api_key)
    }

    /// Subscribe to inbound SMS events, replacing stale tunnel
    /// subscriptions from earlier runs.
    pub async fn register_webhook(config: &Config, webhook_url: &str) -> Result<()> {
        let channel = BirdChannel::new(config, &config.bird_channel_id, "");
        let list_url = channel.subscriptions_url();

        let existing: SubscriptionList = channel
            .client
            .get(&list_url)
            .header("Authorization", channel.auth_header())
            .send()
            .await?
            .json()
            .await?;

        for subscription in existing.results.unwrap_or_default() {
            if subscription.url.contains(".ngrok-free.app") {
                log::info!("[BIRD] Removing stale subscription {}", subscription.id);
                channel
                    .client
                    .delete(format!("{}/{}", list_url, subscription.id))
                    .header("Authorization", channel.auth_header())
                    .send()
                    .await?;
            }
        }

        let body = json!({
            "service": "channels",
            "event": "sms.inbound",
            "url": webhook_url,
            "signingKey": channel.signing_key,
            "eventFilters": [{ "key": "channelId", "value": channel.channel_id }],
        });

        let response = channel
            .client
            .post(&list_url)
            .header("Authorization", channel.auth_header())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Webhook(format!(
                "Bird subscription failed: {}",
                text
            )));
        }

        log::info!("[BIRD] Webhook registered at {}", webhook_url);
        Ok(())
    }
}

#[async_trait]
impl MessageProvider for BirdChannel {
    async fn send_message(&self, text: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/workspaces/{}/channels/{}/messages",
            self.api_url, self.workspace_id, self.channel_id
        );
        let payload = json!({
            "receiver": { "contacts": [{ "identifierValue": self.user_phone }] },
            "body": { "type": "text", "text": { "text": text } },
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SendMessage(format!("Bird send failed: {}", body)));
        }

        // Bird does not return a usable message id for SMS.
        Ok(None)
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>> {
        Err(Error::Unsupported(
            "file attachments are not supported over SMS".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sms_event() -> Value {
        json!({
            "event": "sms.inbound",
            "payload": {
                "sender": { "contact": { "identifierValue": "+15551234567" } },
                "channelId": "ch-1",
                "body": { "text": { "text": "hello from sms" } }
            }
        })
    }

    #[test]
    fn parses_inbound_sms() {
        let inbound = parse_event(&sms_event()).unwrap();
        assert_eq!(inbound.text, "hello from sms");
        assert_eq!(inbound.kind, MessageKind::Text);
        match inbound.metadata {
            ProviderMetadata::Bird(meta) => {
                assert_eq!(meta.phone_number, "+15551234567");
                assert_eq!(meta.channel_id, "ch-1");
                assert_eq!(meta.user_name, "Bird User 4567");
            }
            _ => panic!("expected Bird metadata"),
        }
    }

    #[test]
    fn rejects_event_without_channel_id() {
        let event = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "+15551234567" } },
                "body": { "text": { "text": "hi" } }
            }
        });
        assert!(matches!(parse_event(&event), Err(Error::Parsing(_))));
    }

    #[test]
    fn rejects_event_without_text_body() {
        let event = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "+15551234567" } },
                "channelId": "ch-1",
                "body": {}
            }
        });
        assert!(matches!(parse_event(&event), Err(Error::Parsing(_))));
    }

    #[test]
    fn non_ascii_identifier_does_not_panic() {
        let event = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "a€€" } },
                "channelId": "ch-1",
                "body": { "text": { "text": "hi" } }
            }
        });
        let inbound = parse_event(&event).unwrap();
        assert_eq!(inbound.metadata.user_name(), "Bird User a€€");

        let event = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "tel:+49€1234" } },
                "channelId": "ch-1",
                "body": { "text": { "text": "hi" } }
            }
        });
        let inbound = parse_event(&event).unwrap();
        assert_eq!(inbound.metadata.user_name(), "Bird User 1234");
    }

    #[test]
    fn short_numbers_keep_full_suffix() {
        let event = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "911" } },
                "channelId": "ch-1",
                "body": { "text": { "text": "hi" } }
            }
        });
        let inbound = parse_event(&event).unwrap();
        assert_eq!(inbound.metadata.user_name(), "Bird User 911");
    }
}
