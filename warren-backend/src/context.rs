//! Resolves an inbound message to its user, agent and room,
//! creating whichever of the three does not exist yet.

use crate::channels::{InboundMessage, ProviderMetadata};
use crate::db::Database;
use crate::error::Result;
use crate::models::{Agent, Room, User};

pub struct RequestContext {
    pub user: User,
    pub agent: Agent,
    pub room: Room,
    /// True when this message is the first ever seen from this sender
    pub user_created: bool,
}

impl RequestContext {
    pub fn resolve(db: &Database, message: &InboundMessage) -> Result<RequestContext> {
        let (user, user_created) = match &message.metadata {
            ProviderMetadata::Telegram(meta) => {
                match db.get_user_by_telegram_uid(meta.uid)? {
                    Some(user) => (user, false),
                    None => (db.create_user(Some(meta.uid), None)?, true),
                }
            }
            ProviderMetadata::Bird(meta) => {
                match db.get_user_by_phone(&meta.phone_number)? {
                    Some(user) => (user, false),
                    None => (db.create_user(None, Some(&meta.phone_number))?, true),
                }
            }
        };

        let agent = match &message.metadata {
            ProviderMetadata::Telegram(meta) => {
                match db.get_agent_by_telegram_chat(meta.chat_id)? {
                    Some(agent) => agent,
                    None => db.create_agent(Some(meta.chat_id), None)?,
                }
            }
            ProviderMetadata::Bird(meta) => {
                match db.get_agent_by_bird_channel(&meta.channel_id)? {
                    Some(agent) => agent,
                    None => db.create_agent(None, Some(&meta.channel_id))?,
                }
            }
        };

        let room = match db.get_room(user.id, agent.id)? {
            Some(room) => room,
            None => {
                let (telegram_chat_id, bird_channel_id) = match &message.metadata {
                    ProviderMetadata::Telegram(meta) => (Some(meta.chat_id), None),
                    ProviderMetadata::Bird(meta) => (None, Some(meta.channel_id.as_str())),
                };
                db.create_room(user.id, agent.id, telegram_chat_id, bird_channel_id)?
            }
        };

        Ok(RequestContext {
            user,
            agent,
            room,
            user_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{MessageKind, TelegramMeta};

    fn telegram_message(uid: i64, chat_id: i64, text: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_string(),
            kind: MessageKind::Text,
            metadata: ProviderMetadata::Telegram(TelegramMeta {
                uid,
                chat_id,
                user_name: "Ada Lovelace".to_string(),
            }),
        }
    }

    #[test]
    fn first_message_creates_user_agent_room() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::resolve(&db, &telegram_message(42, 100, "hi")).unwrap();

        assert!(ctx.user_created);
        assert_eq!(ctx.user.telegram_uid, Some(42));
        assert_eq!(ctx.agent.telegram_chat_id, Some(100));
        assert_eq!(ctx.room.user_id, ctx.user.id);
        assert_eq!(ctx.room.agent_id, ctx.agent.id);
    }

    #[test]
    fn second_message_resolves_same_triple() {
        let db = Database::open_in_memory().unwrap();
        let first = RequestContext::resolve(&db, &telegram_message(42, 100, "hi")).unwrap();
        let second =
            RequestContext::resolve(&db, &telegram_message(42, 100, "again")).unwrap();

        assert!(!second.user_created);
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.agent.id, second.agent.id);
        assert_eq!(first.room.id, second.room.id);
    }

    #[test]
    fn bird_sender_resolves_by_phone() {
        use crate::channels::BirdMeta;

        let db = Database::open_in_memory().unwrap();
        let message = InboundMessage {
            text: "hello".to_string(),
            kind: MessageKind::Text,
            metadata: ProviderMetadata::Bird(BirdMeta {
                phone_number: "+15551234567".to_string(),
                channel_id: "ch-1".to_string(),
                user_name: "Bird User 4567".to_string(),
            }),
        };

        let first = RequestContext::resolve(&db, &message).unwrap();
        let second = RequestContext::resolve(&db, &message).unwrap();

        assert!(first.user_created);
        assert!(!second.user_created);
        assert_eq!(first.user.phone_number.as_deref(), Some("+15551234567"));
        assert_eq!(first.room.id, second.room.id);
    }
}
