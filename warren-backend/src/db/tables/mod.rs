//! Database table modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for one table.

mod agents;      // agents
mod autodb;      // dynamic AutoDB domain tables
mod credentials; // credentials
mod messages;    // messages
mod rooms;       // rooms
mod users;       // users
