//! Response types for the gateway.

use crate::request::MessageRole;
use serde::{Deserialize, Serialize};

/// Characters per token used for usage estimates
pub const CHARS_PER_TOKEN: usize = 4;

/// Canonical non-streaming completion (`chat.completion`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Completion id
    pub id: String,
    /// Always `chat.completion`
    pub object: String,
    /// Unix timestamp (seconds)
    pub created: i64,
    /// Model that produced the completion
    pub model: String,
    /// Completion choices
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
}

impl ChatCompletion {
    /// Single-choice assistant completion
    #[must_use]
    pub fn assistant_text(model: impl Into<String>, content: impl Into<String>, usage: Usage) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(content),
                finish_reason: Some(FinishReason::Stop),
            }],
            usage,
        }
    }

    /// Content of the first choice
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// A completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    pub index: u32,
    /// Generated message
    pub message: ResponseMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Assistant message in a completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Always assistant
    pub role: MessageRole,
    /// Generated text
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls, passed through from upstreams that produce them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl ResponseMessage {
    /// Plain assistant text message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
        }
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop
    Stop,
    /// Token limit reached
    Length,
    /// Model requested tool calls
    ToolCalls,
    /// Filtered by the upstream
    ContentFilter,
}

impl FinishReason {
    /// Parse an OpenAI-style finish reason
    #[must_use]
    pub fn from_openai(reason: &str) -> Option<Self> {
        match reason {
            "stop" | "end_turn" => Some(Self::Stop),
            "length" | "max_tokens" => Some(Self::Length),
            "tool_calls" | "function_call" => Some(Self::ToolCalls),
            "content_filter" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Approximate usage from character counts (`ceil(chars / 4)` per side)
    #[must_use]
    pub fn estimate(prompt_chars: usize, completion_chars: usize) -> Self {
        let prompt_tokens = estimate_tokens(prompt_chars);
        let completion_tokens = estimate_tokens(completion_chars);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// `ceil(chars / 4)`
#[must_use]
pub fn estimate_tokens(chars: usize) -> u32 {
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

/// Model object (OpenAI `/v1/models` entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    /// Internal model id
    pub id: String,
    /// Always `model`
    pub object: String,
    /// Creation timestamp
    pub created: i64,
    /// Owning provider id
    pub owned_by: String,
    /// User-facing name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// User-facing provider name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ModelObject {
    /// Create a model object
    #[must_use]
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: 0,
            owned_by: owned_by.into(),
            display_name: None,
            provider: None,
        }
    }

    /// Attach a display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Attach the provider name
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// Model list (OpenAI `/v1/models`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Always `list`
    pub object: String,
    /// Models
    pub data: Vec<ModelObject>,
}

impl ModelsResponse {
    /// Wrap a list of models
    #[must_use]
    pub fn new(data: Vec<ModelObject>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
