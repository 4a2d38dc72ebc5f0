//! User table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::User;

impl Database {
    /// Get a user by Telegram uid
    pub fn get_user_by_telegram_uid(&self, telegram_uid: i64) -> SqliteResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, phone_number, telegram_uid
             FROM users WHERE telegram_uid = ?1",
        )?;

        let user = stmt
            .query_row([telegram_uid], |row| Self::row_to_user(row))
            .ok();
        Ok(user)
    }

    /// Get a user by phone number
    pub fn get_user_by_phone(&self, phone_number: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, phone_number, telegram_uid
             FROM users WHERE phone_number = ?1",
        )?;

        let user = stmt
            .query_row([phone_number], |row| Self::row_to_user(row))
            .ok();
        Ok(user)
    }

    /// Create a user with only the known identifier populated.
    ///
    /// `INSERT OR IGNORE` + re-select via the partial unique indexes, so a
    /// concurrent first contact converges on a single row.
    pub fn create_user(
        &self,
        telegram_uid: Option<i64>,
        phone_number: Option<&str>,
    ) -> SqliteResult<User> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO users (created_at, phone_number, telegram_uid)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![&now, phone_number, telegram_uid],
            )?;
        }

        let user = match (telegram_uid, phone_number) {
            (Some(uid), _) => self.get_user_by_telegram_uid(uid)?,
            (None, Some(phone)) => self.get_user_by_phone(phone)?,
            (None, None) => None,
        };

        user.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub(crate) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at_str: String = row.get(1)?;
        Ok(User {
            id: row.get(0)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            phone_number: row.get(2)?,
            telegram_uid: row.get(3)?,
        })
    }
}
