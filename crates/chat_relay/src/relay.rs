//! Relays one streamed model response to a client.
//!
//! [`ResponseSession`] holds the per-response state and decides what to emit
//! for each fragment. [`StreamRelay`] drives sessions from an upstream
//! provider and delivers the results through the connection hub.

use crate::directives::{self, Directive, DispatchRecord};
use crate::dispatcher::ToolDispatcher;
use crate::hub::ConnectionHub;
use crate::protocol::ServerMessage;
use llm::{ApiError, LLMProvider, LLMRequest, Message, StreamingChunk, StreamingError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Draining,
    Completed,
    Failed,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Response session is {0:?} and cannot accept this event")]
    InvalidState(RelayState),
    #[error("{0}")]
    Upstream(String),
}

/// Work produced by one fragment
#[derive(Debug, Default, PartialEq)]
pub struct StepOutput {
    /// Directives seen for the first time, in buffer order
    pub directives: Vec<Directive>,
    /// Newly visible text
    pub chunk: Option<String>,
}

/// Work produced by the end of the stream
#[derive(Debug, Default, PartialEq)]
pub struct DrainOutput {
    pub directives: Vec<Directive>,
    pub chunk: Option<String>,
    /// The full response as the user should see it
    pub content: String,
}

/// State of one assistant response
pub struct ResponseSession {
    message_id: String,
    buffer: String,
    released: usize,
    dispatched: DispatchRecord,
    state: RelayState,
}

impl Default for ResponseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSession {
    pub fn new() -> Self {
        Self::with_message_id(Uuid::new_v4().to_string())
    }

    pub fn with_message_id(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            buffer: String::new(),
            released: 0,
            dispatched: DispatchRecord::new(),
            state: RelayState::Idle,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Begin streaming and return the `start` notification
    pub fn start(&mut self) -> Result<ServerMessage, RelayError> {
        if self.state != RelayState::Idle {
            return Err(RelayError::InvalidState(self.state));
        }
        self.state = RelayState::Streaming;
        Ok(ServerMessage::Start {
            message_id: self.message_id.clone(),
        })
    }

    pub fn push_fragment(&mut self, fragment: &str) -> Result<StepOutput, RelayError> {
        if self.state != RelayState::Streaming {
            return Err(RelayError::InvalidState(self.state));
        }
        self.buffer.push_str(fragment);

        let directives = self.new_directives();
        let release = directives::safe_prefix(&self.buffer, self.released);
        self.released += release.consumed;

        Ok(StepOutput {
            directives,
            chunk: (!release.is_empty()).then_some(release.text),
        })
    }

    /// Process the end of the stream. Calling it again yields no further
    /// directives or chunks and the same content.
    pub fn drain(&mut self) -> Result<DrainOutput, RelayError> {
        match self.state {
            RelayState::Streaming => self.state = RelayState::Draining,
            RelayState::Draining | RelayState::Completed => {}
            state => return Err(RelayError::InvalidState(state)),
        }

        let directives = self.new_directives();
        let release = directives::final_release(&self.buffer, self.released);
        self.released += release.consumed;

        Ok(DrainOutput {
            directives,
            chunk: (!release.is_empty()).then_some(release.text),
            content: directives::clean_text(&self.buffer),
        })
    }

    /// Mark the `complete` notification as sent
    pub fn finish(&mut self) -> Result<(), RelayError> {
        match self.state {
            RelayState::Draining | RelayState::Completed => {
                self.state = RelayState::Completed;
                Ok(())
            }
            state => Err(RelayError::InvalidState(state)),
        }
    }

    pub fn fail(&mut self) {
        self.state = RelayState::Failed;
    }

    fn new_directives(&mut self) -> Vec<Directive> {
        let mut fresh = Vec::new();
        for directive in directives::extract_directives(&self.buffer) {
            if self.dispatched.should_dispatch(&directive) {
                fresh.push(directive);
            }
        }
        fresh
    }
}

/// User-facing text for an upstream failure
fn describe_upstream_error(error: &anyhow::Error) -> String {
    if let Some(api_error) = error.downcast_ref::<ApiError>() {
        api_error.to_string()
    } else if let Some(streaming_error) = error.downcast_ref::<StreamingError>() {
        streaming_error.to_string()
    } else {
        format!("Error processing request: {error}")
    }
}

/// Streams model responses to clients, one session per turn
pub struct StreamRelay {
    provider: Arc<dyn LLMProvider>,
    dispatcher: ToolDispatcher,
    hub: Arc<ConnectionHub>,
    system_prompt: String,
    fragment_timeout: Duration,
}

impl StreamRelay {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        dispatcher: ToolDispatcher,
        hub: Arc<ConnectionHub>,
        system_prompt: String,
        fragment_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            hub,
            system_prompt,
            fragment_timeout,
        }
    }

    /// Stream one response for `messages` to `client_id`.
    ///
    /// Ends with exactly one `complete` or `error` notification. The returned
    /// error mirrors the `error` notification.
    pub async fn run_turn(&self, client_id: &str, messages: Vec<Message>) -> Result<(), RelayError> {
        let request = LLMRequest {
            messages,
            system_prompt: self.system_prompt.clone(),
            ..Default::default()
        };
        debug!("Starting turn for client {}\n{}", client_id, request);

        let mut session = ResponseSession::new();
        let opened =
            tokio::time::timeout(self.fragment_timeout, self.provider.stream_message(request)).await;
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.fail(client_id, &mut session, &e)),
            Err(_) => {
                let e = anyhow::Error::new(ApiError::Timeout);
                return Err(self.fail(client_id, &mut session, &e));
            }
        };

        loop {
            let fragment = match tokio::time::timeout(self.fragment_timeout, stream.next_fragment()).await
            {
                Ok(Ok(fragment)) => fragment,
                Ok(Err(e)) => return Err(self.fail(client_id, &mut session, &e)),
                Err(_) => {
                    let e = anyhow::Error::new(ApiError::Timeout);
                    return Err(self.fail(client_id, &mut session, &e));
                }
            };

            if session.state() == RelayState::Idle {
                let start = session.start()?;
                self.hub.send(client_id, start);
            }

            match fragment {
                StreamingChunk::Text(text) => {
                    trace!("Fragment for {}: {:?}", session.message_id(), text);
                    let step = session.push_fragment(&text)?;
                    self.emit(client_id, &session, step.directives, step.chunk);
                }
                StreamingChunk::StreamingComplete => {
                    let drained = session.drain()?;
                    self.emit(client_id, &session, drained.directives, drained.chunk);
                    self.hub.send(
                        client_id,
                        ServerMessage::Complete {
                            message_id: session.message_id().to_string(),
                            content: drained.content,
                        },
                    );
                    session.finish()?;
                    info!(
                        "Completed message {} for client {}",
                        session.message_id(),
                        client_id
                    );
                    return Ok(());
                }
            }
        }
    }

    fn emit(
        &self,
        client_id: &str,
        session: &ResponseSession,
        directives: Vec<Directive>,
        chunk: Option<String>,
    ) {
        for directive in directives {
            self.dispatcher
                .dispatch(directive, client_id, session.message_id());
        }
        if let Some(content) = chunk {
            self.hub.send(
                client_id,
                ServerMessage::Chunk {
                    message_id: session.message_id().to_string(),
                    content,
                },
            );
        }
    }

    fn fail(&self, client_id: &str, session: &mut ResponseSession, e: &anyhow::Error) -> RelayError {
        let message = describe_upstream_error(e);
        error!(
            "Turn for client {} failed in state {:?}: {:#}",
            client_id,
            session.state(),
            e
        );
        session.fail();
        self.hub.send(
            client_id,
            ServerMessage::Error {
                message: message.clone(),
            },
        );
        RelayError::Upstream(message)
    }
}
