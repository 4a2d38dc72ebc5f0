//! Conversation identity rows: User, Agent, Room, plus the message log and
//! stored OAuth credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity anchor for a human. Created on first contact from an unseen
/// provider identifier; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub phone_number: Option<String>,
    pub telegram_uid: Option<i64>,
}

/// Bot persona / channel binding. One per provider channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub telegram_chat_id: Option<i64>,
    pub bird_channel_id: Option<String>,
}

/// Conversation between one User and one Agent. At most one per
/// (user_id, agent_id) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub agent_id: i64,
    pub telegram_chat_id: Option<i64>,
    pub bird_channel_id: Option<String>,
}

/// Append-only conversation log entry. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub room_id: i64,
    pub created_at: DateTime<Utc>,
    pub from_bot: bool,
    pub content: String,
}

/// OAuth token set for a user. At most one live credential per user,
/// overwritten on re-auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleCredential {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoogleCredential {
    /// A credential is usable while its access token has not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match self.token_expiry {
            Some(expiry) => expiry > now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn credential_validity_tracks_expiry() {
        let now = Utc::now();
        let mut cred = GoogleCredential {
            user_id: 1,
            access_token: "tok".to_string(),
            refresh_token: None,
            token_expiry: Some(now + Duration::hours(1)),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(cred.is_valid(now));

        cred.token_expiry = Some(now - Duration::minutes(1));
        assert!(!cred.is_valid(now));

        cred.token_expiry = None;
        assert!(cred.is_valid(now));
    }
}
