use serde::{Deserialize, Serialize};

/// Tracks token usage for a request/response pair
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Usage {
    /// Number of tokens in the input (prompt)
    pub input_tokens: u32,
    /// Number of tokens in the output (completion)
    pub output_tokens: u32,
}

/// Generic request structure that can be mapped to different providers
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    pub messages: Vec<Message>,
    pub system_prompt: String,
    /// Overrides the client's sampling temperature for this request
    pub temperature: Option<f32>,
    /// Overrides the client's completion token limit for this request
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Generic response structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Usage,
}

/// Common error types for upstream failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upstream API error: {status}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request to upstream provider timed out")]
    Timeout,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors in the framing of a streamed response
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Upstream stream ended without a completion marker")]
    UnexpectedEnd,

    #[error("Upstream stream contained invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
