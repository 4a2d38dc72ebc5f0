pub mod bird;
pub mod dispatcher;
pub mod telegram;
pub mod types;

pub use dispatcher::MessageDispatcher;
pub use types::{
    BirdMeta, DispatchOutcome, InboundMessage, MessageKind, ProviderKind, ProviderMetadata,
    TelegramMeta,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, Result};

/// Outbound side of a messaging channel, bound to one recipient.
#[async_trait]
pub trait MessageProvider: Send + Sync {
    /// Deliver a message, returning the provider's message id when it
    /// has one.
    async fn send_message(&self, text: &str) -> Result<Option<String>>;

    /// Fetch the raw bytes of a file the sender attached.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Detect which provider a webhook body came from and parse it.
pub fn parse_inbound(body: &Value) -> Result<InboundMessage> {
    if body.get("update_id").is_some() {
        telegram::parse_update(body)
    } else if body.get("payload").is_some() {
        bird::parse_event(body)
    } else {
        Err(Error::Parsing(
            "webhook body matches no known provider".to_string(),
        ))
    }
}

/// Build the channel that can reply to this message's sender.
pub fn provider_for(message: &InboundMessage, config: &Config) -> Box<dyn MessageProvider> {
    match &message.metadata {
        ProviderMetadata::Telegram(meta) => Box::new(telegram::TelegramChannel::new(
            &config.telegram_bot_token,
            meta.chat_id,
        )),
        ProviderMetadata::Bird(meta) => Box::new(bird::BirdChannel::new(
            config,
            &meta.channel_id,
            &meta.phone_number,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_telegram_bodies() {
        let body = json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": { "id": 42, "first_name": "Ada" },
                "chat": { "id": 100 },
                "date": 1700000000,
                "text": "hi"
            }
        });
        let inbound = parse_inbound(&body).unwrap();
        assert_eq!(inbound.metadata.kind(), ProviderKind::Telegram);
    }

    #[test]
    fn detects_bird_bodies() {
        let body = json!({
            "payload": {
                "sender": { "contact": { "identifierValue": "+15551234567" } },
                "channelId": "ch-1",
                "body": { "text": { "text": "hi" } }
            }
        });
        let inbound = parse_inbound(&body).unwrap();
        assert_eq!(inbound.metadata.kind(), ProviderKind::Bird);
    }

    #[test]
    fn rejects_unknown_bodies() {
        assert!(matches!(
            parse_inbound(&json!({ "hello": "world" })),
            Err(Error::Parsing(_))
        ));
    }
}
