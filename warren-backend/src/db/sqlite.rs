//! SQLite database - schema definitions and connection management
//!
//! This file contains:
//! - Database struct definition
//! - Connection management (new, init)
//! - Schema creation
//!
//! All table operations live in the tables/ subdirectory.

use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

/// Main database wrapper with connection pooling via Mutex
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection and initialize schema
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// In-memory database for tests
    #[cfg(test)]
    pub fn open_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize all database tables
    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Users table - identity anchors, one per provider external id
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                phone_number TEXT,
                telegram_uid INTEGER
            )",
            [],
        )?;

        // Partial unique indexes make find-or-create idempotent under
        // concurrent first-contact requests.
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_telegram_uid
             ON users(telegram_uid) WHERE telegram_uid IS NOT NULL",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_phone_number
             ON users(phone_number) WHERE phone_number IS NOT NULL",
            [],
        )?;

        // Agents table - bot persona / channel bindings
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                telegram_chat_id INTEGER,
                bird_channel_id TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_telegram_chat
             ON agents(telegram_chat_id) WHERE telegram_chat_id IS NOT NULL",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_bird_channel
             ON agents(bird_channel_id) WHERE bird_channel_id IS NOT NULL",
            [],
        )?;

        // Rooms table - one conversation per (user, agent) pair
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                agent_id INTEGER NOT NULL,
                telegram_chat_id INTEGER,
                bird_channel_id TEXT,
                UNIQUE(user_id, agent_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (agent_id) REFERENCES agents(id)
            )",
            [],
        )?;

        // Messages table - append-only conversation log
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                from_bot INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL,
                FOREIGN KEY (room_id) REFERENCES rooms(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_room
             ON messages(room_id, created_at)",
            [],
        )?;

        // Credentials table - one live OAuth token set per user
        conn.execute(
            "CREATE TABLE IF NOT EXISTS credentials (
                user_id INTEGER PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                token_expiry TEXT,
                token_uri TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            [],
        )?;

        Ok(())
    }
}
