//! Common streaming infrastructure for LLM providers
//!
//! This module provides shared abstractions for handling streaming responses:
//! raw chunk sources (a live HTTP body, or anything else that yields bytes) and
//! the line splitting needed to turn them into server-sent events.

use crate::{ApiError, StreamingError};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Response;
use std::time::Duration;

/// Trait for streaming chunk sources
///
/// This abstraction allows providers to use the same decoding logic for live
/// HTTP responses and for in-memory sources in tests.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Real HTTP response chunk stream with a bounded wait per chunk
pub struct HttpChunkStream {
    response: Response,
    idle_timeout: Duration,
}

impl HttpChunkStream {
    pub fn new(response: Response, idle_timeout: Duration) -> Self {
        Self {
            response,
            idle_timeout,
        }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(self.idle_timeout, self.response.chunk()).await {
            Err(_) => Err(ApiError::Timeout.into()),
            Ok(Ok(Some(chunk))) => Ok(Some(chunk.to_vec())),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) if e.is_timeout() => Err(ApiError::Timeout.into()),
            Ok(Err(e)) => Err(ApiError::NetworkError(format!("HTTP chunk error: {e}")).into()),
        }
    }
}

/// Splits a byte stream into text lines.
///
/// Lines are only decoded once complete, so multi-byte characters split across
/// network chunks are reassembled before UTF-8 validation.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every line completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, StreamingError> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.pending);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                lines.push(String::from_utf8(line)?);
            } else {
                self.pending.push(byte);
            }
        }
        Ok(lines)
    }

    /// Return the unterminated remainder, if any
    pub fn finish(&mut self) -> Result<Option<String>, StreamingError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8(line)?))
    }
}
