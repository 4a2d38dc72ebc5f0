//! Domain models shared across the crate.

mod autodb;
mod identity;

pub use autodb::{ColumnSpec, TableKind, TableSpec};
pub use identity::{Agent, GoogleCredential, MessageRecord, Room, User};
