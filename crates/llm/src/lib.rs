//! LLM integration module providing abstraction over the upstream text generator
//!
//! This module implements:
//! - Common interface for LLM interactions via the LLMProvider trait
//! - An OpenAI-compatible chat completions client
//! - Lazy fragment streams decoded from server-sent events
//! - Shared types and error classification for upstream failures


mod utils;

pub mod display;
pub mod openai;
pub mod streaming;
pub mod types;

pub use openai::OpenAIClient;
pub use streaming::{ChunkStream, HttpChunkStream, SseLineDecoder};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Structure to represent the pieces of a streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingChunk {
    /// Regular text content
    Text(String),
    /// Explicit end-of-stream marker sent by the provider
    StreamingComplete,
}

/// A lazy sequence of text fragments for one upstream response.
///
/// The sequence is terminated by [`StreamingChunk::StreamingComplete`]. Once the
/// marker was returned, further calls keep returning it. A source that ends
/// without the marker yields [`StreamingError::UnexpectedEnd`].
#[async_trait]
pub trait FragmentStream: Send {
    async fn next_fragment(&mut self) -> Result<StreamingChunk>;
}

/// Trait for different LLM provider implementations
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends a request and waits for the complete response
    async fn send_message(&self, request: LLMRequest) -> Result<LLMResponse>;

    /// Sends a streaming request and returns the fragment sequence
    async fn stream_message(&self, request: LLMRequest) -> Result<Box<dyn FragmentStream>>;
}
