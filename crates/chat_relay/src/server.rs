//! HTTP and WebSocket endpoints

use crate::config::RelayConfig;
use crate::dispatcher::ToolDispatcher;
use crate::hub::{ClientConnection, ConnectionHub};
use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::relay::StreamRelay;
use crate::tools::{HandlerRegistry, LocalDocumentStore};
use anyhow::Result;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use llm::{LLMProvider, Message, OpenAIClient};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub relay: Arc<StreamRelay>,
    pub store: Arc<LocalDocumentStore>,
    pub provider_configured: bool,
}

impl AppState {
    /// Wire up the relay around `provider`
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        handlers: HandlerRegistry,
        store: Arc<LocalDocumentStore>,
        config: &RelayConfig,
    ) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let dispatcher = ToolDispatcher::new(Arc::new(handlers), hub.clone());
        let relay = StreamRelay::new(
            provider,
            dispatcher,
            hub.clone(),
            config.system_prompt.clone(),
            config.request_timeout,
        );
        Self {
            hub,
            relay: Arc::new(relay),
            store,
            provider_configured: config.api_key.is_some(),
        }
    }

    /// State backed by the OpenAI-compatible client and local document storage
    pub fn from_config(config: &RelayConfig) -> Self {
        let provider: Arc<dyn LLMProvider> = Arc::new(
            OpenAIClient::new(
                config.api_key.clone(),
                config.model.clone(),
                config.base_url.clone(),
            )
            .with_timeout(config.request_timeout),
        );
        let store = Arc::new(LocalDocumentStore::new(
            config.storage_dir.clone(),
            config.public_url.clone(),
        ));
        let handlers = HandlerRegistry::with_default_handlers(provider.clone(), store.clone());
        Self::new(provider, handlers, store, config)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/ws/:client_id", get(ws_handler))
        .route("/download/:filename", get(download))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "Chat Relay Service",
        "status": "running",
        "active_connections": state.hub.active_connections(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "active_connections": state.hub.active_connections(),
        "provider_configured": state.provider_configured,
    }))
}

async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let Some(path) = state.store.resolve(&filename) else {
        warn!("Rejected download of {:?}", filename);
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if filename.ends_with(".json") {
                "application/json"
            } else {
                "application/octet-stream"
            };
            (
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            debug!("Download of {} failed: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: AppState) {
    let ClientConnection {
        connection_id,
        mut receiver,
    } = state.hub.connect(&client_id);
    let (mut sink, mut stream) = socket.split();

    // Single writer per socket keeps notifications in send order. It ends
    // when the hub drops the client's queue.
    let mut writer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {} message: {}", message.kind(), e);
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut turns = JoinSet::new();
    loop {
        let incoming = tokio::select! {
            incoming = stream.next() => incoming,
            _ = &mut writer => {
                info!("Outbound queue for client {} closed, dropping socket", client_id);
                break;
            }
        };
        let Some(incoming) = incoming else { break };
        let text = match incoming {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error for client {}: {}", client_id, e);
                break;
            }
        };

        match protocol::parse_client_message(&text) {
            Ok(ClientMessage::Ping) => {
                state.hub.send(&client_id, ServerMessage::Pong);
            }
            Ok(ClientMessage::Chat { content, history }) => {
                info!("Chat message from client {}", client_id);
                let mut messages = history;
                messages.push(Message::user(content));

                let relay = state.relay.clone();
                let client_id = client_id.clone();
                turns.spawn(async move {
                    if let Err(e) = relay.run_turn(&client_id, messages).await {
                        debug!("Turn for client {} ended with error: {}", client_id, e);
                    }
                });
            }
            Err(e) => {
                warn!("Rejected message from client {}: {}", client_id, e);
                state.hub.send(
                    &client_id,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                );
            }
        }

        while turns.try_join_next().is_some() {}
    }

    turns.abort_all();
    state.hub.disconnect(&client_id, connection_id);
    writer.abort();
}
