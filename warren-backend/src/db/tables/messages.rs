//! Message log operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::MessageRecord;

impl Database {
    /// Append a message to a room's log
    pub fn insert_message(
        &self,
        room_id: i64,
        from_bot: bool,
        content: &str,
    ) -> SqliteResult<MessageRecord> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (room_id, created_at, from_bot, content)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![room_id, &now_str, from_bot as i32, content],
        )?;

        Ok(MessageRecord {
            id: conn.last_insert_rowid(),
            room_id,
            created_at: now,
            from_bot,
            content: content.to_string(),
        })
    }

    /// Recent messages for a room, oldest first
    pub fn get_recent_messages(
        &self,
        room_id: i64,
        limit: i32,
    ) -> SqliteResult<Vec<MessageRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, room_id, created_at, from_bot, content
             FROM messages WHERE room_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;

        let mut messages: Vec<MessageRecord> = stmt
            .query_map(rusqlite::params![room_id, limit], |row| {
                Self::row_to_message(row)
            })?
            .filter_map(|r| r.ok())
            .collect();

        // Reverse to get chronological order
        messages.reverse();
        Ok(messages)
    }

    /// Count messages in a room
    pub fn count_messages(&self, room_id: i64) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
            [room_id],
            |row| row.get(0),
        )
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<MessageRecord> {
        let created_at_str: String = row.get(2)?;
        Ok(MessageRecord {
            id: row.get(0)?,
            room_id: row.get(1)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            from_bot: row.get::<_, i32>(3)? != 0,
            content: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_fixture(db: &Database) -> i64 {
        let user = db.create_user(Some(1), None).unwrap();
        let agent = db.create_agent(Some(10), None).unwrap();
        db.create_room(user.id, agent.id, Some(10), None).unwrap().id
    }

    #[test]
    fn history_comes_back_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let room_id = room_fixture(&db);

        db.insert_message(room_id, false, "first").unwrap();
        db.insert_message(room_id, true, "second").unwrap();
        db.insert_message(room_id, false, "third").unwrap();

        let history = db.get_recent_messages(room_id, 10).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(!history[0].from_bot);
        assert!(history[1].from_bot);
    }

    #[test]
    fn limit_keeps_the_newest_messages() {
        let db = Database::open_in_memory().unwrap();
        let room_id = room_fixture(&db);

        for i in 0..5 {
            db.insert_message(room_id, false, &format!("msg-{}", i)).unwrap();
        }

        let history = db.get_recent_messages(room_id, 2).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg-3", "msg-4"]);
    }

    #[test]
    fn count_tracks_inserts() {
        let db = Database::open_in_memory().unwrap();
        let room_id = room_fixture(&db);
        assert_eq!(db.count_messages(room_id).unwrap(), 0);

        db.insert_message(room_id, false, "hi").unwrap();
        assert_eq!(db.count_messages(room_id).unwrap(), 1);
    }
}
