use crate::streaming::{ChunkStream, HttpChunkStream, SseLineDecoder};
use crate::{
    types::*, utils, ApiError, FragmentStream, LLMProvider, StreamingChunk, StreamingError,
};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Clone)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            api_key,
            temperature: 0.7,
            max_tokens: 1000,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bound for sending a request and for each wait on the response body
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn get_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: LLMRequest, streaming: bool) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(OpenAIChatMessage {
                role: MessageRole::System.to_string(),
                content: request.system_prompt,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| OpenAIChatMessage {
            role: m.role.to_string(),
            content: m.content,
        }));

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            stream: streaming.then_some(true),
        }
    }

    async fn post(&self, body: &OpenAIRequest) -> Result<Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Authentication("API key not configured".to_string()))?;

        let send = self
            .client
            .post(self.get_url())
            .bearer_auth(api_key)
            .json(body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(utils::classify_request_error)?;

        utils::check_response_error(response).await
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn send_message(&self, request: LLMRequest) -> Result<LLMResponse> {
        let body = self.build_request(request, false);
        let response = self.post(&body).await?;

        let response_text = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(utils::classify_request_error)?;

        let parsed: OpenAIResponse = serde_json::from_str(&response_text)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse response: {e}")))?;

        Ok(LLMResponse {
            content: parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default(),
            usage: parsed
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    async fn stream_message(&self, request: LLMRequest) -> Result<Box<dyn FragmentStream>> {
        let body = self.build_request(request, true);
        debug!(
            "Sending streaming request with {} messages to {}",
            body.messages.len(),
            self.get_url()
        );
        let response = self.post(&body).await?;

        Ok(Box::new(OpenAIFragmentStream::new(HttpChunkStream::new(
            response,
            self.timeout,
        ))))
    }
}

/// Decodes chat completion server-sent events into text fragments
pub struct OpenAIFragmentStream<S> {
    source: S,
    decoder: SseLineDecoder,
    pending: VecDeque<StreamingChunk>,
    done: bool,
    source_exhausted: bool,
}

impl<S: ChunkStream> OpenAIFragmentStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            decoder: SseLineDecoder::new(),
            pending: VecDeque::new(),
            done: false,
            source_exhausted: false,
        }
    }

    fn process_sse_line(&mut self, line: &str) {
        if self.done {
            return;
        }
        // Comments, event names and blank separators carry no content
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<OpenAIStreamResponse>(data) {
            Ok(event) => {
                let content = event
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content);
                if let Some(content) = content.filter(|c| !c.is_empty()) {
                    self.pending.push_back(StreamingChunk::Text(content));
                }
            }
            Err(e) => warn!("Failed to parse stream event '{}': {}", data, e),
        }
    }
}

#[async_trait]
impl<S: ChunkStream> FragmentStream for OpenAIFragmentStream<S> {
    async fn next_fragment(&mut self) -> Result<StreamingChunk> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(chunk);
            }
            if self.done {
                return Ok(StreamingChunk::StreamingComplete);
            }
            if self.source_exhausted {
                return Err(StreamingError::UnexpectedEnd.into());
            }

            match self.source.next_chunk().await? {
                Some(bytes) => {
                    for line in self.decoder.feed(&bytes)? {
                        self.process_sse_line(&line);
                    }
                }
                None => {
                    self.source_exhausted = true;
                    if let Some(line) = self.decoder.finish()? {
                        self.process_sse_line(&line);
                    }
                }
            }
        }
    }
}
