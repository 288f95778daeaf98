//! Claude API Client
//!
//! Anthropic Messages API client with tool use and prompt caching.
//! Agent instructions are static per agent, so the system block is sent with
//! `cache_control: ephemeral`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::recovery::RetryPolicy;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Server-side blocks (web search calls and results) we only read past
    #[serde(other)]
    Unsupported,
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        join_text(&self.content)
    }
}

/// A model call
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model hint (haiku, sonnet, opus) or a full model id
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Tool definitions in Anthropic format
    pub tools: Vec<Value>,
    pub max_tokens: usize,
}

/// Token usage reported by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
    #[serde(default)]
    pub cache_read_input_tokens: usize,
    #[serde(default)]
    pub cache_creation_input_tokens: usize,
}

/// A model reply
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl ModelResponse {
    /// Text-only reply (handy for tests and scripted models)
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: Some("end_turn".to_string()),
            usage: Usage::default(),
        }
    }

    /// Concatenated text blocks
    pub fn joined_text(&self) -> String {
        join_text(&self.content)
    }

    /// Client-side tool calls requested by the model
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }

    /// Content that can be sent back as the assistant turn
    pub fn replayable_content(&self) -> Vec<ContentBlock> {
        self.content
            .iter()
            .filter(|b| !matches!(b, ContentBlock::Unsupported))
            .cloned()
            .collect()
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Anything that can answer a model request
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

/// System message block with optional cache control
#[derive(Debug, Serialize)]
struct SystemBlock<'a> {
    r#type: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    r#type: &'static str,
}

/// API request
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: Vec<SystemBlock<'a>>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
}

/// API response
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

/// Claude API client
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl ClaudeClient {
    pub fn new(api_key: Option<&str>, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.map(|s| s.to_string()),
            retry,
        }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.anthropic_api_key.as_deref(), config.retry_policy())
    }

    /// Check if API key is configured
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get model ID from hint
    pub fn model_id(model: &str) -> String {
        match model.to_lowercase().as_str() {
            "haiku" => "claude-3-5-haiku-20241022".to_string(),
            "opus" => "claude-opus-4-20250514".to_string(),
            "sonnet" | "" => "claude-sonnet-4-20250514".to_string(),
            _ => model.to_string(),
        }
    }

    async fn send(&self, body: &MessageRequest<'_>) -> Result<ModelResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY not set - cannot reach the tutor model"))?;

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("Claude API error {}: {}", status, text);
        }

        let result: MessageResponse = response.json().await?;
        Ok(ModelResponse {
            content: result.content,
            stop_reason: result.stop_reason,
            usage: result.usage,
        })
    }
}

#[async_trait]
impl ModelClient for ClaudeClient {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let model_id = Self::model_id(&request.model);

        let body = MessageRequest {
            model: &model_id,
            max_tokens: request.max_tokens,
            system: vec![SystemBlock {
                r#type: "text",
                text: &request.system,
                cache_control: Some(CacheControl { r#type: "ephemeral" }),
            }],
            messages: &request.messages,
            tools: &request.tools,
        };

        debug!(
            "Calling Claude API: model={}, messages={}, tools={}",
            model_id,
            request.messages.len(),
            request.tools.len()
        );

        let response = self.retry.run("claude", || self.send(&body)).await?;

        info!(
            "Claude response: model={}, in={}, out={}, cache_read={}, stop={:?}",
            model_id,
            response.usage.input_tokens,
            response.usage.output_tokens,
            response.usage.cache_read_input_tokens,
            response.stop_reason
        );

        Ok(response)
    }
}
