//! Schema-driven structured extraction into per-user domain tables.
//!
//! From the table schemas this derives the intent filters the
//! classifier grades against (row tables match on the whole table,
//! column tables match per column) and the response structure the
//! extraction prompt asks the model for.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ai::intent::{at_or_above, Confidence, IntentDetector, IntentFilter};
use crate::ai::{clean_and_parse_llm_json, LlmClient, Message};
use crate::db::Database;
use crate::error::Result;
use crate::models::{ColumnSpec, TableKind, TableSpec};

/// Where one detected intent writes: a whole row table, or one column.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataLocation {
    table: String,
    column: Option<String>,
}

impl DataLocation {
    /// Intent titles are `TABLE` or `TABLE_COLUMN`, split at the first
    /// underscore.
    fn from_title(title: &str) -> DataLocation {
        match title.find('_') {
            Some(i) => DataLocation {
                table: title[..i].to_lowercase(),
                column: Some(title[i + 1..].to_lowercase()),
            },
            None => DataLocation {
                table: title.to_lowercase(),
                column: None,
            },
        }
    }
}

/// One record written during a save pass, reported back for
/// summarization.
#[derive(Debug, Clone)]
pub struct SavedRecord {
    pub table: String,
    pub data: Value,
}

pub struct AutoDb {
    db: Arc<Database>,
    llm: LlmClient,
    detector: IntentDetector,
    tables: Vec<TableSpec>,
    /// Intent title -> response structure fed to the extraction prompt
    structures: HashMap<String, Value>,
}

fn column_structure(columns: &[&ColumnSpec]) -> Value {
    let mut map = serde_json::Map::new();
    for column in columns {
        map.insert(
            column.name.clone(),
            Value::String(format!("({}) {}", column.datatype, column.description)),
        );
    }
    Value::Object(map)
}

/// Default domain tables tracked for every user.
pub fn default_tables() -> Vec<TableSpec> {
    vec![
        TableSpec {
            name: "spend".to_string(),
            kind: TableKind::Row,
            description: "The user mentions spending money on something, \
                          e.g. 'I spent $20 on groceries'."
                .to_string(),
            columns: vec![
                ColumnSpec {
                    name: "amount".to_string(),
                    datatype: "integer".to_string(),
                    description: "how much money was spent".to_string(),
                },
                ColumnSpec {
                    name: "category".to_string(),
                    datatype: "string".to_string(),
                    description: "what the money was spent on".to_string(),
                },
                ColumnSpec {
                    name: "spent_at".to_string(),
                    datatype: "timestamp".to_string(),
                    description: "when the purchase happened".to_string(),
                },
            ],
        },
        TableSpec {
            name: "reminders".to_string(),
            kind: TableKind::Row,
            description: "The user asks to be reminded of something or mentions \
                          an upcoming event, appointment or deadline."
                .to_string(),
            columns: vec![
                ColumnSpec {
                    name: "title".to_string(),
                    datatype: "string".to_string(),
                    description: "short name for the event or task".to_string(),
                },
                ColumnSpec {
                    name: "starts_at".to_string(),
                    datatype: "timestamp".to_string(),
                    description: "when the event starts or the task is due".to_string(),
                },
                ColumnSpec {
                    name: "details".to_string(),
                    datatype: "string".to_string(),
                    description: "any extra context the user gave".to_string(),
                },
            ],
        },
        TableSpec {
            name: "profile".to_string(),
            kind: TableKind::Column,
            description: "Standing facts about the user.".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "home_city".to_string(),
                    datatype: "string".to_string(),
                    description: "the city the user lives in".to_string(),
                },
                ColumnSpec {
                    name: "occupation".to_string(),
                    datatype: "string".to_string(),
                    description: "what the user does for work".to_string(),
                },
            ],
        },
    ]
}

/// Intent filters and extraction structures derived from the schemas.
fn derive_targets(tables: &[TableSpec]) -> (Vec<IntentFilter>, HashMap<String, Value>) {
    let mut filters = Vec::new();
    let mut structures = HashMap::new();

    for table in tables {
        match table.kind {
            TableKind::Row => {
                let title = table.name.to_uppercase();
                filters.push(IntentFilter::new(&title, &table.description));
                structures.insert(
                    title,
                    column_structure(&table.columns.iter().collect::<Vec<_>>()),
                );
            }
            TableKind::Column => {
                for column in &table.columns {
                    let title =
                        format!("{}_{}", table.name.to_uppercase(), column.name.to_uppercase());
                    filters.push(IntentFilter::new(&title, &column.description));
                    structures.insert(title, column_structure(&[column]));
                }
            }
        }
    }

    (filters, structures)
}

impl AutoDb {
    pub fn new(db: Arc<Database>, llm: LlmClient, tables: Vec<TableSpec>) -> Result<Self> {
        db.create_domain_tables(&tables)?;
        let (filters, structures) = derive_targets(&tables);
        let detector = IntentDetector::new(llm.clone(), &filters);

        Ok(AutoDb {
            db,
            llm,
            detector,
            tables,
            structures,
        })
    }

    fn table_spec(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Detect which tables the message concerns, extract structured data
    /// for each and write it. Returns what was saved. Extraction or write
    /// failures on one target are logged and skipped.
    pub async fn save_data(&self, text: &str, user_id: i64) -> Result<Vec<SavedRecord>> {
        let detected = self.detector.detect(text).await?;
        let titles = at_or_above(&detected, Confidence::High);
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let mut saved = Vec::new();
        for title in titles {
            let Some(structure) = self.structures.get(&title) else {
                log::warn!("[AUTODB] Detected unknown target '{}'", title);
                continue;
            };

            let data = match self.extract(text, structure).await {
                Ok(data) => data,
                Err(e) => {
                    log::error!("[AUTODB] Extraction failed for '{}': {}", title, e);
                    continue;
                }
            };

            let location = DataLocation::from_title(&title);
            let Some(spec) = self.table_spec(&location.table) else {
                log::warn!("[AUTODB] No schema for table '{}'", location.table);
                continue;
            };

            let write = match (&location.column, data.as_object()) {
                (Some(column), Some(values)) => {
                    let value = values
                        .get(column)
                        .cloned()
                        .or_else(|| values.values().next().cloned())
                        .unwrap_or(Value::Null);
                    self.db.update_cell(spec, column, user_id, &value)
                }
                (None, Some(values)) => self.db.append_row(spec, user_id, values),
                _ => {
                    log::warn!("[AUTODB] Extraction for '{}' was not an object", title);
                    continue;
                }
            };

            match write {
                Ok(()) => saved.push(SavedRecord {
                    table: location.table.clone(),
                    data,
                }),
                Err(e) => log::error!("[AUTODB] Write failed for '{}': {}", title, e),
            }
        }

        Ok(saved)
    }

    /// Read back stored rows from every table the message appears to
    /// concern, for grounding conversational replies.
    pub async fn get_data(&self, text: &str, user_id: i64) -> Result<Vec<SavedRecord>> {
        let detected = self.detector.detect(text).await?;
        let mut tables: Vec<String> = detected
            .keys()
            .map(|title| DataLocation::from_title(title).table)
            .collect();
        tables.sort();
        tables.dedup();

        let mut records = Vec::new();
        for table in tables {
            let Some(spec) = self.table_spec(&table) else {
                continue;
            };
            for row in self.db.read_domain_rows(spec, user_id)? {
                records.push(SavedRecord {
                    table: table.clone(),
                    data: Value::Object(row),
                });
            }
        }
        Ok(records)
    }

    async fn extract(&self, text: &str, structure: &Value) -> Result<Value> {
        let system_prompt = format!(
            "Extract structured data from the user's message.\n\
             The current date and time is {}.\n\
             Respond with only a JSON object with exactly these keys, where each\n\
             value follows its (datatype) description:\n{}",
            Utc::now().to_rfc3339(),
            serde_json::to_string_pretty(structure).unwrap_or_default()
        );

        let raw = self.llm.generate(&system_prompt, &[Message::user(text)]).await?;
        clean_and_parse_llm_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_split_into_table_and_column() {
        assert_eq!(
            DataLocation::from_title("SPEND"),
            DataLocation {
                table: "spend".to_string(),
                column: None
            }
        );
        assert_eq!(
            DataLocation::from_title("PROFILE_HOME_CITY"),
            DataLocation {
                table: "profile".to_string(),
                column: Some("home_city".to_string())
            }
        );
    }

    #[test]
    fn row_tables_get_one_filter_column_tables_one_per_column() {
        let (filters, structures) = derive_targets(&default_tables());

        let titles: Vec<&str> = filters.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"SPEND"));
        assert!(titles.contains(&"REMINDERS"));
        assert!(titles.contains(&"PROFILE_HOME_CITY"));
        assert!(titles.contains(&"PROFILE_OCCUPATION"));
        assert!(!titles.contains(&"PROFILE"));

        let spend = structures.get("SPEND").unwrap().as_object().unwrap();
        assert_eq!(spend.len(), 3);
        assert!(spend["amount"].as_str().unwrap().starts_with("(integer)"));

        let home = structures.get("PROFILE_HOME_CITY").unwrap().as_object().unwrap();
        assert_eq!(home.len(), 1);
    }
}
