//! OpenAI reply generator - chat completions over HTTPS.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAIConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_system_prompt("Sos Marta, asesora de ventas...");
//!
//! let generator = OpenAIReplyGenerator::new(config)?;
//! ```
//!
//! The engine bounds every call with its own timeout; the HTTP client
//! timeout here only guards a single attempt.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{PromptMessage, PromptRole, ReplyError, ReplyGenerator, ReplyRequest};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI generator.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    /// Persona and ground rules, sent as the first system message.
    pub system_prompt: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl OpenAIConfig {
    pub fn new(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_prompt: String::new(),
            timeout: Duration::from_secs(20),
            max_retries: 2,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

pub struct OpenAIReplyGenerator {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIReplyGenerator {
    pub fn new(config: OpenAIConfig) -> Result<Self, ReplyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReplyError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn to_openai_request(&self, request: &ReplyRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !self.config.system_prompt.is_empty() {
            messages.push(OpenAIMessage::new(PromptRole::System, &self.config.system_prompt));
        }
        messages.extend(
            request
                .history
                .iter()
                .map(|PromptMessage { role, content }| OpenAIMessage::new(*role, content)),
        );
        messages.push(OpenAIMessage::new(PromptRole::System, &request.instruction));

        OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(0.7),
        }
    }

    async fn send_request(&self, request: &OpenAIRequest) -> Result<Response, ReplyError> {
        self.client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReplyError::Timeout(self.config.timeout.as_secs())
                } else if e.is_connect() {
                    ReplyError::Network(format!("Connection failed: {}", e))
                } else {
                    ReplyError::Network(e.to_string())
                }
            })
    }

    async fn handle_response_status(response: Response) -> Result<Response, ReplyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ReplyError::AuthenticationFailed),
            429 => Err(ReplyError::RateLimited {
                retry_after_secs: parse_retry_after(&error_body),
            }),
            500..=599 => Err(ReplyError::Unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(ReplyError::Network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    async fn attempt(&self, request: &OpenAIRequest) -> Result<String, ReplyError> {
        let response = self.send_request(request).await?;
        let response = Self::handle_response_status(response).await?;
        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Parse(format!("Failed to parse response: {}", e)))?;
        extract_reply(body)
    }
}

#[async_trait]
impl ReplyGenerator for OpenAIReplyGenerator {
    async fn generate_reply(&self, request: ReplyRequest) -> Result<String, ReplyError> {
        let openai_request = self.to_openai_request(&request);
        let mut retry_count = 0;

        loop {
            match self.attempt(&openai_request).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_retryable() && retry_count < self.config.max_retries => {
                    tracing::warn!(
                        chat_id = %request.chat_id,
                        attempt = retry_count + 1,
                        error = %err,
                        "reply generation failed, retrying"
                    );
                    // 1s, 2s, 4s, ...
                    sleep(Duration::from_secs(1 << retry_count)).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Reads "try again in Ns" out of a rate-limit body; 30 when absent.
fn parse_retry_after(error_body: &str) -> u32 {
    serde_json::from_str::<serde_json::Value>(error_body)
        .ok()
        .and_then(|parsed| {
            let message = parsed.get("error")?.get("message")?.as_str()?.to_string();
            let rest = &message[message.find("try again in ")? + 13..];
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            rest[..end].parse::<u32>().ok()
        })
        .unwrap_or(30)
}

fn extract_reply(body: OpenAIResponse) -> Result<String, ReplyError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ReplyError::Parse("No choices in response".to_string()))?;
    let text = choice.message.content.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(ReplyError::EmptyReply);
    }
    Ok(text.to_string())
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: PromptRole,
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIMessage {
    fn new(role: PromptRole, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ChatId;
    use serde_json::json;

    fn generator() -> OpenAIReplyGenerator {
        OpenAIReplyGenerator::new(
            OpenAIConfig::new(Secret::new("sk-test".to_string()))
                .with_system_prompt("Sos Marta.")
                .with_base_url("http://localhost:9/v1/"),
        )
        .unwrap()
    }

    #[test]
    fn request_wraps_history_between_persona_and_instruction() {
        let mut request = ReplyRequest::new(ChatId::new("c").unwrap(), "Respondé breve");
        request.history = vec![
            PromptMessage::new(PromptRole::User, "¿es seguro?"),
            PromptMessage::new(PromptRole::Assistant, "Sí, es natural"),
        ];

        let body = serde_json::to_value(generator().to_openai_request(&request)).unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], json!({"role": "system", "content": "Sos Marta."}));
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[3], json!({"role": "system", "content": "Respondé breve"}));
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        assert_eq!(
            generator().completions_url(),
            "http://localhost:9/v1/chat/completions"
        );
    }

    #[test]
    fn retry_after_is_read_from_message() {
        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 7s."}}"#;
        assert_eq!(parse_retry_after(body), 7);
        assert_eq!(parse_retry_after("not json"), 30);
    }

    #[test]
    fn blank_completion_is_an_empty_reply() {
        let body: OpenAIResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  "}}]
        }))
        .unwrap();
        assert_eq!(extract_reply(body), Err(ReplyError::EmptyReply));
    }

    #[test]
    fn completion_text_is_trimmed() {
        let body: OpenAIResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": " Dale 😊 \n"}}]
        }))
        .unwrap();
        assert_eq!(extract_reply(body).unwrap(), "Dale 😊");
    }
}
