//! LLM gateway
//!
//! [`ChatModel`] is the single seam between the pipeline and a hosted
//! chat-completion model. [`AnthropicClient`] speaks the Anthropic Messages API
//! and classifies provider failures into transient and fatal errors; wrap it in
//! [`crate::retry::RetryingModel`] for backoff.

use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ScoutError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A chat-completion capable model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the assistant's text
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for std::sync::Arc<M> {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).invoke(messages).await
    }
}

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Messages endpoint URL
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
    /// Upper bound on a whole request, including reading the response
    pub read_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            connect_timeout: Duration::from_secs(120),
            read_timeout: Duration::from_secs(120),
        }
    }
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ScoutError::Config(
                "ANTHROPIC_API_KEY not set. The LLM gateway requires API access.".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let turns: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.join("\n\n"));
        }
        body
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let request_body = self.request_body(messages);
        debug!(model = %self.config.model, turns = messages.len(), "Invoking model");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &error_text));
        }

        let response_json: serde_json::Value = response.json().await?;
        let text: String = response_json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ScoutError::Llm("Model returned no text content".to_string()));
        }
        Ok(text)
    }
}

/// Map a failed provider response to a transient or fatal error
pub fn classify_error(status: u16, body: &str) -> ScoutError {
    let error_type = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["type"]
                .as_str()
                .or_else(|| v["__type"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let message = format!("HTTP {}: {}", status, body);
    let is_throttle = |s: &str| s.contains("rate_limit_error") || s.contains("ThrottlingException");
    let is_unavailable = |s: &str| s.contains("overloaded_error") || s.contains("ServiceUnavailable");

    if status == 429 || is_throttle(&error_type) {
        ScoutError::RateLimited(message)
    } else if status == 503 || status == 529 || is_unavailable(&error_type) {
        ScoutError::ServiceUnavailable(message)
    } else {
        ScoutError::Llm(message)
    }
}
