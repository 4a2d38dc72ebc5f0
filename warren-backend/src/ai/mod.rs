pub mod autodb;
pub mod client;
pub mod intent;

pub use autodb::AutoDb;
pub use client::LlmClient;
pub use intent::{Confidence, IntentDetector, IntentFilter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl ToString for MessageRole {
    fn to_string(&self) -> String {
        match self {
            MessageRole::System => "system".to_string(),
            MessageRole::User => "user".to_string(),
            MessageRole::Assistant => "assistant".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Extract a JSON object from raw model output.
///
/// Models wrap JSON in markdown fences or prose, so everything outside
/// the outermost braces is discarded and whitespace is collapsed before
/// parsing.
pub fn clean_and_parse_llm_json(raw: &str) -> Result<Value> {
    let start = raw
        .find('{')
        .ok_or_else(|| Error::Llm(format!("no JSON object in model output: {}", raw)))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| Error::Llm(format!("no JSON object in model output: {}", raw)))?;
    if end < start {
        return Err(Error::Llm(format!("malformed model output: {}", raw)));
    }

    let snippet = &raw[start..=end];
    let collapsed: String = snippet
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    serde_json::from_str(&collapsed)
        .map_err(|e| Error::Llm(format!("model output is not valid JSON ({}): {}", e, snippet)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"intent\": {\"question\": \"HIGH\"}}\n```";
        let value = clean_and_parse_llm_json(raw).unwrap();
        assert_eq!(value["intent"]["question"], "HIGH");
    }

    #[test]
    fn parses_json_with_surrounding_prose() {
        let raw = "Sure, here you go: {\"a\": 1} hope that helps!";
        let value = clean_and_parse_llm_json(raw).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn collapses_internal_newlines() {
        let raw = "{\n  \"title\":\n  \"Grocery run\"\n}";
        let value = clean_and_parse_llm_json(raw).unwrap();
        assert_eq!(value["title"], "Grocery run");
    }

    #[test]
    fn rejects_output_without_braces() {
        assert!(clean_and_parse_llm_json("I cannot answer that.").is_err());
    }

    #[test]
    fn rejects_unbalanced_output() {
        assert!(clean_and_parse_llm_json("} nothing {").is_err());
    }
}
