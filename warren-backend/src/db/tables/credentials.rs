//! Google credential storage operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::GoogleCredential;

impl Database {
    /// Get the stored Google credential for a user
    pub fn get_credential(&self, user_id: i64) -> SqliteResult<Option<GoogleCredential>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT user_id, access_token, refresh_token, token_expiry, token_uri,
                    created_at, updated_at
             FROM credentials WHERE user_id = ?1",
        )?;

        let mut rows = stmt.query_map([user_id], |row| Self::row_to_credential(row))?;
        match rows.next() {
            Some(Ok(cred)) => Ok(Some(cred)),
            _ => Ok(None),
        }
    }

    /// Insert or replace a user's Google credential
    pub fn upsert_credential(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expiry: Option<DateTime<Utc>>,
        token_uri: &str,
    ) -> SqliteResult<GoogleCredential> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let expiry_str = token_expiry.map(|dt| dt.to_rfc3339());

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credentials (user_id, access_token, refresh_token, token_expiry,
                                      token_uri, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = COALESCE(excluded.refresh_token, credentials.refresh_token),
                 token_expiry = excluded.token_expiry,
                 token_uri = excluded.token_uri,
                 updated_at = excluded.updated_at",
            rusqlite::params![user_id, access_token, refresh_token, expiry_str, token_uri, &now_str],
        )?;

        Ok(GoogleCredential {
            user_id,
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            token_expiry,
            token_uri: token_uri.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    fn row_to_credential(row: &rusqlite::Row) -> rusqlite::Result<GoogleCredential> {
        let expiry_str: Option<String> = row.get(3)?;
        let created_at_str: String = row.get(5)?;
        let updated_at_str: String = row.get(6)?;

        Ok(GoogleCredential {
            user_id: row.get(0)?,
            access_token: row.get(1)?,
            refresh_token: row.get(2)?,
            token_expiry: expiry_str.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            token_uri: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn upsert_replaces_token_and_keeps_refresh() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(Some(77), None).unwrap();

        db.upsert_credential(
            user.id,
            "tok-1",
            Some("refresh-1"),
            Some(Utc::now() + Duration::hours(1)),
            "https://oauth2.googleapis.com/token",
        )
        .unwrap();

        // Refresh responses omit the refresh token; the stored one must survive.
        db.upsert_credential(
            user.id,
            "tok-2",
            None,
            Some(Utc::now() + Duration::hours(1)),
            "https://oauth2.googleapis.com/token",
        )
        .unwrap();

        let cred = db.get_credential(user.id).unwrap().unwrap();
        assert_eq!(cred.access_token, "tok-2");
        assert_eq!(cred.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn missing_credential_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_credential(999).unwrap().is_none());
    }
}
