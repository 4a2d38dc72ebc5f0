//! Dynamic user-data table operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use serde_json::Value;

use super::super::Database;
use crate::models::{TableKind, TableSpec};

/// Strip anything that is not a safe SQL identifier character.
/// Table and column names come from our own schema definitions, but
/// they end up interpolated into DDL so they get scrubbed anyway.
fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Database {
    /// Create the backing table for every domain table that does not exist yet
    pub fn create_domain_tables(&self, specs: &[TableSpec]) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        for spec in specs {
            let table = sanitize_identifier(&spec.name);
            let columns: Vec<String> = spec
                .columns
                .iter()
                .map(|c| format!("\"{}\" TEXT", sanitize_identifier(&c.name)))
                .collect();

            let unique = match spec.kind {
                TableKind::Row => String::new(),
                TableKind::Column => ", UNIQUE(user_id)".to_string(),
            };

            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{}\" (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL,
                        created_at TEXT NOT NULL,
                        {}{}
                    )",
                    table,
                    columns.join(",\n                        "),
                    unique
                ),
                [],
            )?;
        }

        Ok(())
    }

    /// Append one record to a row-oriented domain table
    pub fn append_row(
        &self,
        spec: &TableSpec,
        user_id: i64,
        values: &serde_json::Map<String, Value>,
    ) -> SqliteResult<()> {
        let table = sanitize_identifier(&spec.name);

        // Only columns the schema declares make it into the insert
        let mut names: Vec<String> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        for column in &spec.columns {
            if let Some(value) = values.get(&column.name) {
                names.push(format!("\"{}\"", sanitize_identifier(&column.name)));
                texts.push(value_to_text(value));
            }
        }

        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&user_id];
        let now_str = Utc::now().to_rfc3339();
        params.push(&now_str);
        for text in &texts {
            params.push(text);
        }

        let placeholders: Vec<String> =
            (1..=params.len()).map(|i| format!("?{}", i)).collect();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO \"{}\" (user_id, created_at{}{}) VALUES ({})",
                table,
                if names.is_empty() { "" } else { ", " },
                names.join(", "),
                placeholders.join(", ")
            ),
            params.as_slice(),
        )?;

        Ok(())
    }

    /// Overwrite a single cell in a column-oriented domain table,
    /// creating the user's row on first write
    pub fn update_cell(
        &self,
        spec: &TableSpec,
        column: &str,
        user_id: i64,
        value: &Value,
    ) -> SqliteResult<()> {
        let table = sanitize_identifier(&spec.name);
        let column = sanitize_identifier(column);
        let text = value_to_text(value);
        let now_str = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO \"{}\" (user_id, created_at) VALUES (?1, ?2)",
                table
            ),
            rusqlite::params![user_id, &now_str],
        )?;
        conn.execute(
            &format!(
                "UPDATE \"{}\" SET \"{}\" = ?1 WHERE user_id = ?2",
                table, column
            ),
            rusqlite::params![text, user_id],
        )?;

        Ok(())
    }

    /// Read every stored value for a user from a domain table, newest first
    pub fn read_domain_rows(
        &self,
        spec: &TableSpec,
        user_id: i64,
    ) -> SqliteResult<Vec<serde_json::Map<String, Value>>> {
        let table = sanitize_identifier(&spec.name);
        let names: Vec<String> = spec
            .columns
            .iter()
            .map(|c| format!("\"{}\"", sanitize_identifier(&c.name)))
            .collect();

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT created_at{}{} FROM \"{}\" WHERE user_id = ?1 ORDER BY created_at DESC",
            if names.is_empty() { "" } else { ", " },
            names.join(", "),
            table
        ))?;

        let rows = stmt.query_map([user_id], |row| {
            let mut record = serde_json::Map::new();
            let created_at: String = row.get(0)?;
            record.insert("created_at".to_string(), Value::String(created_at));
            for (i, column) in spec.columns.iter().enumerate() {
                let cell: Option<String> = row.get(i + 1)?;
                if let Some(cell) = cell {
                    record.insert(column.name.clone(), Value::String(cell));
                }
            }
            Ok(record)
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;

    fn spend_spec() -> TableSpec {
        TableSpec {
            name: "spend".to_string(),
            kind: TableKind::Row,
            description: "purchases the user mentions".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "amount".to_string(),
                    datatype: "number".to_string(),
                    description: "amount spent".to_string(),
                },
                ColumnSpec {
                    name: "category".to_string(),
                    datatype: "string".to_string(),
                    description: "what it was spent on".to_string(),
                },
            ],
        }
    }

    fn profile_spec() -> TableSpec {
        TableSpec {
            name: "profile".to_string(),
            kind: TableKind::Column,
            description: "facts about the user".to_string(),
            columns: vec![ColumnSpec {
                name: "home_city".to_string(),
                datatype: "string".to_string(),
                description: "where the user lives".to_string(),
            }],
        }
    }

    #[test]
    fn row_table_appends() {
        let db = Database::open_in_memory().unwrap();
        let spec = spend_spec();
        db.create_domain_tables(&[spec.clone()]).unwrap();

        let mut values = serde_json::Map::new();
        values.insert("amount".to_string(), serde_json::json!(20));
        values.insert("category".to_string(), serde_json::json!("groceries"));
        db.append_row(&spec, 1, &values).unwrap();
        db.append_row(&spec, 1, &values).unwrap();

        let rows = db.read_domain_rows(&spec, 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("amount").unwrap(), "20");
    }

    #[test]
    fn column_table_keeps_one_row_per_user() {
        let db = Database::open_in_memory().unwrap();
        let spec = profile_spec();
        db.create_domain_tables(&[spec.clone()]).unwrap();

        db.update_cell(&spec, "home_city", 1, &serde_json::json!("Lisbon"))
            .unwrap();
        db.update_cell(&spec, "home_city", 1, &serde_json::json!("Porto"))
            .unwrap();

        let rows = db.read_domain_rows(&spec, 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("home_city").unwrap(), "Porto");
    }

    #[test]
    fn undeclared_columns_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        let spec = spend_spec();
        db.create_domain_tables(&[spec.clone()]).unwrap();

        let mut values = serde_json::Map::new();
        values.insert("amount".to_string(), serde_json::json!(5));
        values.insert("bogus".to_string(), serde_json::json!("ignored"));
        db.append_row(&spec, 1, &values).unwrap();

        let rows = db.read_domain_rows(&spec, 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("bogus").is_none());
    }
}
