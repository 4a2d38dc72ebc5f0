//! LLM-backed intent classification.
//!
//! Each candidate intent is a filter with a title and a plain-language
//! description. The model grades every filter against the message and
//! returns a confidence per title.

use serde_json::Value;
use std::collections::HashMap;

use crate::ai::{clean_and_parse_llm_json, LlmClient, Message};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_label(label: &str) -> Option<Confidence> {
        match label.to_ascii_uppercase().as_str() {
            "LOW" => Some(Confidence::Low),
            "MEDIUM" => Some(Confidence::Medium),
            "HIGH" => Some(Confidence::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentFilter {
    pub title: String,
    pub description: String,
}

impl IntentFilter {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        IntentFilter {
            title: title.into(),
            description: description.into(),
        }
    }
}

pub struct IntentDetector {
    llm: LlmClient,
    system_prompt: String,
}

impl IntentDetector {
    pub fn new(llm: LlmClient, filters: &[IntentFilter]) -> Self {
        let mut catalog = String::new();
        for filter in filters {
            catalog.push_str(&format!("- {}: {}\n", filter.title, filter.description));
        }

        let system_prompt = format!(
            "You classify a user message against a list of intents.\n\
             Intents:\n{}\n\
             For every intent, grade how confident you are that the message matches it:\n\
             LOW, MEDIUM or HIGH.\n\
             Respond with only a JSON object of the form\n\
             {{\"intent\": {{\"<title>\": \"<CONFIDENCE>\", ...}}}}\n\
             including every intent title exactly as listed. If the message cannot be\n\
             classified, respond with {{\"error\": \"<reason>\"}}.",
            catalog
        );

        IntentDetector { llm, system_prompt }
    }

    /// Classify a message, returning a confidence for each intent title.
    pub async fn detect(&self, text: &str) -> Result<HashMap<String, Confidence>> {
        let raw = self
            .llm
            .generate(&self.system_prompt, &[Message::user(text)])
            .await?;
        let parsed = clean_and_parse_llm_json(&raw)?;
        parse_detection(&parsed)
    }
}

/// Pull the per-intent confidences out of the model's JSON reply.
pub(crate) fn parse_detection(value: &Value) -> Result<HashMap<String, Confidence>> {
    if let Some(reason) = value.get("error").and_then(|v| v.as_str()) {
        return Err(Error::Intent(reason.to_string()));
    }

    let intents = value
        .get("intent")
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::Intent(format!("missing intent object in: {}", value)))?;

    let mut detected = HashMap::new();
    for (title, label) in intents {
        let Some(label) = label.as_str() else {
            continue;
        };
        match Confidence::from_label(label) {
            Some(confidence) => {
                detected.insert(title.clone(), confidence);
            }
            None => {
                log::warn!("[INTENT] Unrecognized confidence '{}' for '{}'", label, title);
            }
        }
    }
    Ok(detected)
}

/// Titles graded at or above the threshold, strongest first.
/// Ties break alphabetically so the order is deterministic.
pub fn at_or_above(
    detected: &HashMap<String, Confidence>,
    threshold: Confidence,
) -> Vec<String> {
    let mut ranked: Vec<(&String, Confidence)> = detected
        .iter()
        .filter(|(_, c)| **c >= threshold)
        .map(|(t, c)| (t, *c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(t, _)| t.clone()).collect()
}

/// The single best-matching title at or above the threshold, if any.
pub fn strongest(
    detected: &HashMap<String, Confidence>,
    threshold: Confidence,
) -> Option<String> {
    at_or_above(detected, threshold).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confidence_is_ordered() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn parses_mixed_confidences() {
        let value = json!({"intent": {"question": "HIGH", "spend": "low", "inform": "Medium"}});
        let detected = parse_detection(&value).unwrap();
        assert_eq!(detected["question"], Confidence::High);
        assert_eq!(detected["spend"], Confidence::Low);
        assert_eq!(detected["inform"], Confidence::Medium);
    }

    #[test]
    fn threshold_filters_titles() {
        let value = json!({"intent": {"a": "HIGH", "b": "MEDIUM", "c": "LOW"}});
        let detected = parse_detection(&value).unwrap();

        assert_eq!(at_or_above(&detected, Confidence::High), vec!["a"]);
        assert_eq!(at_or_above(&detected, Confidence::Medium), vec!["a", "b"]);
        assert_eq!(at_or_above(&detected, Confidence::Low), vec!["a", "b", "c"]);
    }

    #[test]
    fn results_are_ranked_by_confidence_not_name() {
        let value = json!({"intent": {"alpha": "LOW", "zeta": "HIGH", "mid": "MEDIUM"}});
        let detected = parse_detection(&value).unwrap();
        assert_eq!(
            at_or_above(&detected, Confidence::Low),
            vec!["zeta", "mid", "alpha"]
        );
    }

    #[test]
    fn strongest_truncates_to_the_top_match() {
        let value = json!({"intent": {"a": "MEDIUM", "b": "HIGH"}});
        let detected = parse_detection(&value).unwrap();
        assert_eq!(strongest(&detected, Confidence::Medium).as_deref(), Some("b"));
        assert_eq!(strongest(&detected, Confidence::High).as_deref(), Some("b"));

        let value = json!({"intent": {"a": "LOW"}});
        let detected = parse_detection(&value).unwrap();
        assert!(strongest(&detected, Confidence::Medium).is_none());
    }

    #[test]
    fn empty_intent_object_is_empty_map() {
        let detected = parse_detection(&json!({"intent": {}})).unwrap();
        assert!(detected.is_empty());
        assert!(at_or_above(&detected, Confidence::Low).is_empty());
    }

    #[test]
    fn error_key_becomes_intent_error() {
        let err = parse_detection(&json!({"error": "gibberish input"})).unwrap_err();
        assert!(matches!(err, Error::Intent(_)));
    }

    #[test]
    fn unknown_labels_are_skipped() {
        let value = json!({"intent": {"a": "VERY HIGH", "b": "HIGH"}});
        let detected = parse_detection(&value).unwrap();
        assert_eq!(detected.len(), 1);
        assert_eq!(detected["b"], Confidence::High);
    }
}
