use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::{Message, MessageRole};
use crate::config::Config;
use crate::error::{Error, Result};

/// Client for any OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if !config.llm_api_key.is_empty() {
            let auth_value =
                header::HeaderValue::from_str(&format!("Bearer {}", config.llm_api_key))
                    .map_err(|e| Error::Llm(format!("invalid API key format: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.llm_endpoint.clone(),
            model: config.llm_model.clone(),
        })
    }

    /// Run a chat completion and return the first choice's content.
    pub async fn generate(&self, system_prompt: &str, messages: &[Message]) -> Result<String> {
        let mut api_messages = vec![ApiMessage {
            role: MessageRole::System.to_string(),
            content: system_prompt.to_string(),
        }];
        api_messages.extend(messages.iter().map(|m| ApiMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
        };

        log::debug!(
            "[LLM] Sending request to {} with model {}",
            self.endpoint,
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(Error::Llm(parsed.error.message));
            }
            return Err(Error::Llm(format!(
                "completion endpoint returned {}: {}",
                status, error_text
            )));
        }

        let data: CompletionResponse = response.json().await?;
        let choice = data
            .choices
            .first()
            .ok_or_else(|| Error::Llm("completion endpoint returned no choices".to_string()))?;

        Ok(choice.message.content.clone().unwrap_or_default())
    }
}
