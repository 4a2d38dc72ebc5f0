//! Agent table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::Agent;

impl Database {
    /// Get an agent by Telegram chat id
    pub fn get_agent_by_telegram_chat(&self, chat_id: i64) -> SqliteResult<Option<Agent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, telegram_chat_id, bird_channel_id
             FROM agents WHERE telegram_chat_id = ?1",
        )?;

        let agent = stmt.query_row([chat_id], |row| Self::row_to_agent(row)).ok();
        Ok(agent)
    }

    /// Get an agent by Bird channel id
    pub fn get_agent_by_bird_channel(&self, channel_id: &str) -> SqliteResult<Option<Agent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, telegram_chat_id, bird_channel_id
             FROM agents WHERE bird_channel_id = ?1",
        )?;

        let agent = stmt
            .query_row([channel_id], |row| Self::row_to_agent(row))
            .ok();
        Ok(agent)
    }

    /// Create an agent for an unseen provider channel.
    pub fn create_agent(
        &self,
        telegram_chat_id: Option<i64>,
        bird_channel_id: Option<&str>,
    ) -> SqliteResult<Agent> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO agents (created_at, telegram_chat_id, bird_channel_id)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![&now, telegram_chat_id, bird_channel_id],
            )?;
        }

        let agent = match (telegram_chat_id, bird_channel_id) {
            (Some(chat_id), _) => self.get_agent_by_telegram_chat(chat_id)?,
            (None, Some(channel_id)) => self.get_agent_by_bird_channel(channel_id)?,
            (None, None) => None,
        };

        agent.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
        let created_at_str: String = row.get(1)?;
        Ok(Agent {
            id: row.get(0)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            telegram_chat_id: row.get(2)?,
            bird_channel_id: row.get(3)?,
        })
    }
}
