//! Telegram Bot API channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::channels::{InboundMessage, MessageKind, MessageProvider, ProviderMetadata, TelegramMeta};
use crate::error::{Error, Result};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    #[allow(dead_code)]
    update_id: i64,
    message: TelegramMessage,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[allow(dead_code)]
    message_id: i64,
    from: TelegramUser,
    chat: TelegramChat,
    #[allow(dead_code)]
    date: i64,
    text: Option<String>,
    caption: Option<String>,
    photo: Option<Vec<TelegramPhoto>>,
    document: Option<TelegramDocument>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramPhoto {
    file_id: String,
    file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TelegramDocument {
    file_id: String,
    file_name: Option<String>,
}

/// Parse a Telegram webhook update into the provider-neutral form.
pub fn parse_update(body: &Value) -> Result<InboundMessage> {
    let update: TelegramUpdate = serde_json::from_value(body.clone())
        .map_err(|e| Error::Parsing(format!("invalid Telegram update: {}", e)))?;
    let message = update.message;

    let user_name = format!(
        "{} {}",
        message.from.first_name.as_deref().unwrap_or(""),
        message.from.last_name.as_deref().unwrap_or("")
    )
    .trim()
    .to_string();

    let metadata = ProviderMetadata::Telegram(TelegramMeta {
        uid: message.from.id,
        chat_id: message.chat.id,
        user_name,
    });

    // Photos arrive as multiple sizes; take the largest.
    let kind = if let Some(photo) = &message.photo {
        let largest = photo
            .iter()
            .max_by_key(|p| p.file_size.unwrap_or(0))
            .ok_or_else(|| Error::Parsing("Telegram photo list is empty".to_string()))?;
        MessageKind::File {
            file_id: largest.file_id.clone(),
            file_name: None,
        }
    } else if let Some(document) = &message.document {
        MessageKind::File {
            file_id: document.file_id.clone(),
            file_name: document.file_name.clone(),
        }
    } else if message.text.is_some() {
        MessageKind::Text
    } else {
        return Err(Error::Parsing(
            "Telegram message has no text, photo or document".to_string(),
        ));
    };

    let text = message
        .text
        .or(message.caption)
        .unwrap_or_default();

    Ok(InboundMessage {
        text,
        kind,
        metadata,
    })
}

pub struct TelegramChannel {
    client: Client,
    token: String,
    chat_id: i64,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    result: Option<FileInfo>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookInfoResponse {
    result: Option<WebhookInfo>,
}

#[derive(Debug, Deserialize)]
struct WebhookInfo {
    url: Option<String>,
}

impl TelegramChannel {
    pub fn new(token: &str, chat_id: i64) -> Self {
        TelegramChannel {
            client: Client::new(),
            token: token.to_string(),
            chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API, self.token, method)
    }

    /// Point the bot's webhook at `webhook_url`, skipping the call when
    /// it is already set.
    pub async fn register_webhook(token: &str, webhook_url: &str) -> Result<()> {
        let client = Client::new();
        let info_url = format!("{}/bot{}/getWebhookInfo", TELEGRAM_API, token);

        let info: WebhookInfoResponse = client.get(&info_url).send().await?.json().await?;
        if let Some(current) = info.result.and_then(|i| i.url) {
            if current == webhook_url {
                log::info!("[TELEGRAM] Webhook already registered");
                return Ok(());
            }
        }

        let response = client
            .post(format!("{}/bot{}/setWebhook", TELEGRAM_API, token))
            .json(&json!({ "url": webhook_url }))
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Webhook(format!(
                "Telegram setWebhook failed: {}",
                body
            )));
        }

        log::info!("[TELEGRAM] Webhook registered at {}", webhook_url);
        Ok(())
    }
}

#[async_trait]
impl MessageProvider for TelegramChannel {
    async fn send_message(&self, text: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await?;

        let data: SendMessageResponse = response.json().await?;
        if !data.ok {
            return Err(Error::SendMessage(
                data.description
                    .unwrap_or_else(|| "Telegram sendMessage failed".to_string()),
            ));
        }

        Ok(data.result.map(|m| m.message_id.to_string()))
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.method_url("getFile"))
            .json(&json!({ "file_id": file_id }))
            .send()
            .await?;

        let data: GetFileResponse = response.json().await?;
        let file_path = data
            .result
            .filter(|_| data.ok)
            .and_then(|f| f.file_path)
            .ok_or_else(|| Error::SendMessage(format!("no file path for {}", file_id)))?;

        let file_url = format!("{}/file/bot{}/{}", TELEGRAM_API, self.token, file_path);
        let bytes = self.client.get(&file_url).send().await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_update() -> Value {
        json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": { "id": 42, "is_bot": false, "first_name": "Ada", "last_name": "Lovelace" },
                "chat": { "id": 100, "type": "private" },
                "date": 1700000000,
                "text": "hello"
            }
        })
    }

    #[test]
    fn parses_text_message() {
        let inbound = parse_update(&text_update()).unwrap();
        assert_eq!(inbound.text, "hello");
        assert_eq!(inbound.kind, MessageKind::Text);
        match inbound.metadata {
            ProviderMetadata::Telegram(meta) => {
                assert_eq!(meta.uid, 42);
                assert_eq!(meta.chat_id, 100);
                assert_eq!(meta.user_name, "Ada Lovelace");
            }
            _ => panic!("expected Telegram metadata"),
        }
    }

    #[test]
    fn picks_largest_photo_variant() {
        let update = json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "from": { "id": 42, "first_name": "Ada" },
                "chat": { "id": 100 },
                "date": 1700000000,
                "caption": "receipt",
                "photo": [
                    { "file_id": "small", "file_size": 100 },
                    { "file_id": "large", "file_size": 9000 },
                    { "file_id": "medium", "file_size": 2000 }
                ]
            }
        });

        let inbound = parse_update(&update).unwrap();
        assert_eq!(inbound.text, "receipt");
        assert_eq!(
            inbound.kind,
            MessageKind::File {
                file_id: "large".to_string(),
                file_name: None
            }
        );
    }

    #[test]
    fn parses_document_message() {
        let update = json!({
            "update_id": 3,
            "message": {
                "message_id": 12,
                "from": { "id": 42, "first_name": "Ada" },
                "chat": { "id": 100 },
                "date": 1700000000,
                "document": { "file_id": "doc-1", "file_name": "taxes.pdf" }
            }
        });

        let inbound = parse_update(&update).unwrap();
        assert_eq!(
            inbound.kind,
            MessageKind::File {
                file_id: "doc-1".to_string(),
                file_name: Some("taxes.pdf".to_string())
            }
        );
    }

    #[test]
    fn missing_name_parts_are_trimmed() {
        let update = json!({
            "update_id": 4,
            "message": {
                "message_id": 13,
                "from": { "id": 42, "first_name": "Ada" },
                "chat": { "id": 100 },
                "date": 1700000000,
                "text": "hi"
            }
        });

        let inbound = parse_update(&update).unwrap();
        assert_eq!(inbound.metadata.user_name(), "Ada");
    }

    #[test]
    fn rejects_update_without_content() {
        let update = json!({
            "update_id": 5,
            "message": {
                "message_id": 14,
                "from": { "id": 42 },
                "chat": { "id": 100 },
                "date": 1700000000
            }
        });
        assert!(matches!(parse_update(&update), Err(Error::Parsing(_))));
    }

    #[test]
    fn rejects_update_without_message() {
        assert!(matches!(
            parse_update(&json!({ "update_id": 6 })),
            Err(Error::Parsing(_))
        ));
    }
}
