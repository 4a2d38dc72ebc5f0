use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Telegram,
    Bird,
}

/// What kind of content the inbound message carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// A file attachment identified by the provider's file handle
    File { file_id: String, file_name: Option<String> },
}

/// Sender and conversation identifiers from a Telegram update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramMeta {
    pub uid: i64,
    pub chat_id: i64,
    pub user_name: String,
}

/// Sender and conversation identifiers from a Bird SMS event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirdMeta {
    pub phone_number: String,
    pub channel_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMetadata {
    Telegram(TelegramMeta),
    Bird(BirdMeta),
}

impl ProviderMetadata {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderMetadata::Telegram(_) => ProviderKind::Telegram,
            ProviderMetadata::Bird(_) => ProviderKind::Bird,
        }
    }

    pub fn user_name(&self) -> &str {
        match self {
            ProviderMetadata::Telegram(meta) => &meta.user_name,
            ProviderMetadata::Bird(meta) => &meta.user_name,
        }
    }
}

/// Provider-neutral form of an inbound message
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub kind: MessageKind,
    pub metadata: ProviderMetadata,
}

/// Which branch of the dispatch chain handled a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    UserSignup,
    AuthGoogle,
    SaveFile,
    AnswerQuery,
}
