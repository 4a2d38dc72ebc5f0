//! Room table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::Room;

impl Database {
    /// Get the room binding a user to an agent
    pub fn get_room(&self, user_id: i64, agent_id: i64) -> SqliteResult<Option<Room>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, user_id, agent_id, telegram_chat_id, bird_channel_id
             FROM rooms WHERE user_id = ?1 AND agent_id = ?2",
        )?;

        let room = stmt
            .query_row([user_id, agent_id], |row| Self::row_to_room(row))
            .ok();
        Ok(room)
    }

    /// Create the room for a (user, agent) pair, carrying the provider
    /// channel identifiers. UNIQUE(user_id, agent_id) keeps this idempotent.
    pub fn create_room(
        &self,
        user_id: i64,
        agent_id: i64,
        telegram_chat_id: Option<i64>,
        bird_channel_id: Option<&str>,
    ) -> SqliteResult<Room> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO rooms
                 (created_at, user_id, agent_id, telegram_chat_id, bird_channel_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![&now, user_id, agent_id, telegram_chat_id, bird_channel_id],
            )?;
        }

        self.get_room(user_id, agent_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    fn row_to_room(row: &rusqlite::Row) -> rusqlite::Result<Room> {
        let created_at_str: String = row.get(1)?;
        Ok(Room {
            id: row.get(0)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            user_id: row.get(2)?,
            agent_id: row.get(3)?,
            telegram_chat_id: row.get(4)?,
            bird_channel_id: row.get(5)?,
        })
    }
}
