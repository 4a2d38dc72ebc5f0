//! Routes each inbound message through the priority chain:
//! signup, Google auth, file upload, data capture, conversational reply.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::ai::autodb::{default_tables, SavedRecord};
use crate::ai::intent::{strongest, Confidence, IntentDetector, IntentFilter};
use crate::ai::{AutoDb, LlmClient, Message};
use crate::channels::{DispatchOutcome, InboundMessage, MessageKind, MessageProvider};
use crate::config::Config;
use crate::context::RequestContext;
use crate::db::Database;
use crate::error::Result;
use crate::gsuite::{auth, GoogleAuth, GoogleCalendar, GoogleDrive};

const HISTORY_LIMIT: i32 = 50;
const BASE_PROMPT: &str = "You only give answers, no conversation, no extra fluff. ";

pub struct MessageDispatcher {
    db: Arc<Database>,
    config: Arc<Config>,
    llm: LlmClient,
    autodb: AutoDb,
    auth: GoogleAuth,
    save_detector: IntentDetector,
}

impl MessageDispatcher {
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Result<Self> {
        let llm = LlmClient::new(&config)?;
        let autodb = AutoDb::new(db.clone(), llm.clone(), default_tables())?;
        let auth = GoogleAuth::new(&config);

        let save_filters = [
            IntentFilter::new(
                "question",
                "based on the given data, the user has a question or wants to \
                 have a conversation",
            ),
            IntentFilter::new(
                "inform",
                "based on the given data, the user is logging, saving, and/or \
                 tracking information",
            ),
        ];
        let save_detector = IntentDetector::new(llm.clone(), &save_filters);

        Ok(MessageDispatcher {
            db,
            config,
            llm,
            autodb,
            auth,
            save_detector,
        })
    }

    /// Run the full priority chain for one message.
    pub async fn dispatch(
        &self,
        provider: &dyn MessageProvider,
        message: &InboundMessage,
    ) -> Result<DispatchOutcome> {
        let ctx = RequestContext::resolve(&self.db, message)?;

        if ctx.user_created {
            log::info!("[DISPATCH] New user {} signed up", ctx.user.id);
            provider.send_message(&welcome_message(message.metadata.user_name())).await?;
            return Ok(DispatchOutcome::UserSignup);
        }

        let access_token = match self.ensure_credential(&ctx, provider, message).await? {
            Some(token) => token,
            None => return Ok(DispatchOutcome::AuthGoogle),
        };

        if let MessageKind::File { file_id, file_name } = &message.kind {
            log::info!("[DISPATCH] User {} sent a file", ctx.user.id);
            self.save_file(&ctx, provider, &access_token, file_id, file_name.as_deref())
                .await?;
            return Ok(DispatchOutcome::SaveFile);
        }

        self.db.insert_message(ctx.room.id, false, &message.text)?;

        let saved = match self.autodb.save_data(&message.text, ctx.user.id).await {
            Ok(saved) => saved,
            Err(e) => {
                log::error!("[DISPATCH] Structured capture failed: {}", e);
                Vec::new()
            }
        };

        if !saved.is_empty() && self.wants_to_save(&message.text).await {
            log::info!("[DISPATCH] User {} is logging information", ctx.user.id);
            match self.save_to_calendar(&access_token, &saved).await {
                Ok(titles) if !titles.is_empty() => {
                    let note = format!("Saved to your calendar: {}", titles.join(", "));
                    self.db.insert_message(ctx.room.id, true, &note)?;
                    provider.send_message(&note).await?;
                }
                Ok(_) => {}
                Err(e) => log::error!("[DISPATCH] Calendar save failed: {}", e),
            }
        }

        self.send_reply(&ctx, provider, message, None).await?;
        Ok(DispatchOutcome::AnswerQuery)
    }

    /// Degraded path used when `dispatch` fails: greet new users,
    /// otherwise answer from history alone.
    pub async fn simple_response(
        &self,
        provider: &dyn MessageProvider,
        message: &InboundMessage,
    ) -> Result<DispatchOutcome> {
        let ctx = RequestContext::resolve(&self.db, message)?;

        if ctx.user_created {
            provider.send_message(&welcome_message(message.metadata.user_name())).await?;
            return Ok(DispatchOutcome::UserSignup);
        }

        self.send_reply(&ctx, provider, message, Some(&message.text)).await?;
        Ok(DispatchOutcome::AnswerQuery)
    }

    /// A usable access token, refreshing a stale one when possible.
    /// Returns `None` after handling the message as an auth turn.
    async fn ensure_credential(
        &self,
        ctx: &RequestContext,
        provider: &dyn MessageProvider,
        message: &InboundMessage,
    ) -> Result<Option<String>> {
        let now = Utc::now();

        if let Some(cred) = self.db.get_credential(ctx.user.id)? {
            if cred.is_valid(now) {
                return Ok(Some(cred.access_token));
            }
            if let Some(refresh_token) = &cred.refresh_token {
                match self.auth.refresh(refresh_token).await {
                    Ok(tokens) => {
                        self.db.upsert_credential(
                            ctx.user.id,
                            &tokens.access_token,
                            tokens.refresh_token.as_deref(),
                            tokens.expiry,
                            auth::TOKEN_ENDPOINT,
                        )?;
                        return Ok(Some(tokens.access_token));
                    }
                    Err(e) => {
                        log::warn!("[DISPATCH] Token refresh failed for user {}: {}", ctx.user.id, e)
                    }
                }
            }
        }

        // The message might be a pasted authorization code.
        let code = message.text.trim();
        if !code.is_empty() {
            if let Ok(tokens) = self.auth.exchange_code(code).await {
                self.db.upsert_credential(
                    ctx.user.id,
                    &tokens.access_token,
                    tokens.refresh_token.as_deref(),
                    tokens.expiry,
                    auth::TOKEN_ENDPOINT,
                )?;
                let success = format!(
                    "Thanks {}, your Google account is connected! You can now send me \
                     files, reminders and anything you want tracked.",
                    message.metadata.user_name()
                );
                self.db.insert_message(ctx.room.id, true, &success)?;
                provider.send_message(&success).await?;
                return Ok(None);
            }
        }

        log::info!("[DISPATCH] User {} needs Google authentication", ctx.user.id);
        let prompt = format!(
            "To connect your Google account, open this link, approve access and \
             send me the code Google shows you:\n{}",
            self.auth.auth_url()
        );
        provider.send_message(&prompt).await?;
        Ok(None)
    }

    async fn save_file(
        &self,
        ctx: &RequestContext,
        provider: &dyn MessageProvider,
        access_token: &str,
        file_id: &str,
        file_name: Option<&str>,
    ) -> Result<()> {
        let bytes = provider.download_file(file_id).await?;

        let name = match file_name {
            Some(name) => name.to_string(),
            None => format!("upload-{}", Utc::now().format("%Y-%m-%d-%H-%M-%S")),
        };

        let drive = GoogleDrive::new(access_token);
        let folder_id = drive.get_or_create_folder(&self.config.drive_folder_name).await?;
        let link = drive.upload_file(&name, bytes, &folder_id).await?;

        let calendar = GoogleCalendar::new(access_token);
        let calendar_id = calendar
            .get_or_create_calendar(&self.config.calendar_name, &self.config.calendar_description)
            .await?;
        let start = Utc::now();
        calendar
            .add_event(
                &calendar_id,
                "🗂️ Saved Document",
                &format!("Link to the saved document on drive:\n{}", link),
                start,
                start + Duration::minutes(20),
            )
            .await?;

        let note = format!(
            "Your file is saved in the '{}' folder on Drive: {}",
            self.config.drive_folder_name, link
        );
        self.db.insert_message(ctx.room.id, true, &note)?;
        provider.send_message(&note).await?;
        Ok(())
    }

    /// True when the message reads as the user logging information
    /// rather than asking something. Detection failures count as no.
    async fn wants_to_save(&self, text: &str) -> bool {
        match self.save_detector.detect(text).await {
            Ok(detected) => {
                strongest(&detected, Confidence::High).as_deref() == Some("inform")
            }
            Err(e) => {
                log::error!("[DISPATCH] Save-intent detection failed: {}", e);
                false
            }
        }
    }

    /// One calendar event per saved record, titled and described by the
    /// model. Returns the titles of the events written.
    async fn save_to_calendar(
        &self,
        access_token: &str,
        saved: &[SavedRecord],
    ) -> Result<Vec<String>> {
        let calendar = GoogleCalendar::new(access_token);
        let calendar_id = calendar
            .get_or_create_calendar(&self.config.calendar_name, &self.config.calendar_description)
            .await?;

        let mut titles = Vec::new();
        for record in saved {
            let summary = format!("{}: {}", record.table, record.data);

            let title_prompt = format!(
                "{}You will get some data, please generate a calendar title for it. \
                 A related emoji must precede the title. It must have the main action \
                 verb. It must be concise.",
                BASE_PROMPT
            );
            let title = self
                .llm
                .generate(&title_prompt, &[Message::user(&summary)])
                .await?
                .replace('\n', " ")
                .trim()
                .to_string();

            let description_prompt = format!(
                "{}You will get some data, please generate a calendar description for \
                 it. Don't mention any start and end time information, nor id info. \
                 Please properly describe what the event or action taken is. \
                 Prioritize bullet list formatting.",
                BASE_PROMPT
            );
            let description = self
                .llm
                .generate(&description_prompt, &[Message::user(&summary)])
                .await?;

            let start = record
                .data
                .get("start_time")
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now);
            let end = record
                .data
                .get("end_time")
                .and_then(parse_timestamp)
                .unwrap_or(start + Duration::minutes(45));

            calendar
                .add_event(&calendar_id, &title, &description, start, end)
                .await?;
            titles.push(title);
        }

        Ok(titles)
    }

    /// Conversational reply grounded in room history and stored data.
    /// `extra` carries the inbound text when it was not logged first.
    async fn send_reply(
        &self,
        ctx: &RequestContext,
        provider: &dyn MessageProvider,
        message: &InboundMessage,
        extra: Option<&str>,
    ) -> Result<()> {
        let history = self.db.get_recent_messages(ctx.room.id, HISTORY_LIMIT)?;
        let mut chat: Vec<Message> = history
            .into_iter()
            .map(|record| {
                if record.from_bot {
                    Message::assistant(record.content)
                } else {
                    Message::user(record.content)
                }
            })
            .collect();
        if let Some(text) = extra {
            chat.push(Message::user(text));
        }

        let relevant = match self.autodb.get_data(&message.text, ctx.user.id).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("[DISPATCH] Could not fetch stored data: {}", e);
                Vec::new()
            }
        };
        let user_information = relevant
            .iter()
            .map(|r| format!("{}: {}", r.table, r.data))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = format!(
            "You are Warren, a personal assistant chatting with {} over a messaging \
             app. The current time is {}. Keep replies short and conversational.\n\
             Stored information about the user:\n{}",
            message.metadata.user_name(),
            Utc::now().to_rfc3339(),
            if user_information.is_empty() {
                "(none)"
            } else {
                user_information.as_str()
            },
        );

        let reply = self.llm.generate(&system_prompt, &chat).await?;
        self.db.insert_message(ctx.room.id, true, &reply)?;
        provider.send_message(&reply).await?;
        Ok(())
    }
}

fn welcome_message(user_name: &str) -> String {
    format!(
        "Hi {}! I'm Warren, your personal assistant. Tell me things you want \
         tracked, send me files to keep, or just ask me questions. To get started \
         I'll need access to your Google account on your next message.",
        user_name
    )
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ProviderMetadata, TelegramMeta};
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProvider {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn new() -> Self {
            RecordingProvider {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageProvider for RecordingProvider {
        async fn send_message(&self, text: &str) -> Result<Option<String>> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(None)
        }

        async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>> {
            Err(Error::Unsupported("no files in tests".to_string()))
        }
    }

    fn test_config() -> Config {
        Config {
            port: 0,
            database_url: ":memory:".to_string(),
            public_url: None,
            telegram_bot_token: "test-token".to_string(),
            bird_api_url: "https://api.bird.test".to_string(),
            bird_organization_id: String::new(),
            bird_workspace_id: String::new(),
            bird_api_key: String::new(),
            bird_signing_key: String::new(),
            bird_channel_id: String::new(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_auth_scopes: vec![],
            llm_endpoint: "http://localhost:1/v1/chat/completions".to_string(),
            llm_api_key: String::new(),
            llm_model: "test".to_string(),
            calendar_name: "Test".to_string(),
            calendar_description: "Test calendar".to_string(),
            drive_folder_name: "Test Uploads".to_string(),
        }
    }

    fn telegram_message(text: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_string(),
            kind: MessageKind::Text,
            metadata: ProviderMetadata::Telegram(TelegramMeta {
                uid: 42,
                chat_id: 100,
                user_name: "Ada".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn new_user_gets_welcome_and_no_message_row() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher =
            MessageDispatcher::new(db.clone(), Arc::new(test_config())).unwrap();
        let provider = RecordingProvider::new();

        let outcome = dispatcher
            .dispatch(&provider, &telegram_message("hello"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::UserSignup);
        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Ada"));

        let room = db.get_room(1, 1).unwrap().unwrap();
        assert_eq!(db.count_messages(room.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn fallback_also_welcomes_new_users() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher =
            MessageDispatcher::new(db.clone(), Arc::new(test_config())).unwrap();
        let provider = RecordingProvider::new();

        let outcome = dispatcher
            .simple_response(&provider, &telegram_message("hello"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::UserSignup);
        assert_eq!(provider.sent.lock().unwrap().len(), 1);
    }
}
