use serde::{Deserialize, Serialize};

/// How records accumulate in a domain table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Every extraction appends a new row
    Row,
    /// One row per user; extractions overwrite single cells
    Column,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub datatype: String,
    pub description: String,
}

/// Schema for one user-data domain table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub kind: TableKind,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
}
