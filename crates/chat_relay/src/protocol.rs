//! JSON messages exchanged with WebSocket clients

use indexmap::IndexMap;
use llm::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Notifications sent to a client. Serialized with the kind in the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Start {
        message_id: String,
    },
    Chunk {
        message_id: String,
        content: String,
    },
    Detected {
        message_id: String,
        tool_name: String,
        status: String,
        message: String,
        parameters: IndexMap<String, String>,
    },
    ToolCompleted {
        message_id: String,
        tool_name: String,
        file_path: Option<String>,
        data: Map<String, Value>,
    },
    ToolFailed {
        message_id: String,
        tool_name: String,
        error: String,
    },
    Complete {
        message_id: String,
        content: String,
    },
    Error {
        message: String,
    },
    Pong,
}

impl ServerMessage {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Start { .. } => "start",
            ServerMessage::Chunk { .. } => "chunk",
            ServerMessage::Detected { .. } => "detected",
            ServerMessage::ToolCompleted { .. } => "tool_completed",
            ServerMessage::ToolFailed { .. } => "tool_failed",
            ServerMessage::Complete { .. } => "complete",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Pong => "pong",
        }
    }
}

/// Requests received from a client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// A new user message, preceded by the conversation so far
    Chat {
        content: String,
        history: Vec<Message>,
    },
    Ping,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),
    #[error("Invalid chat message: {0}")]
    InvalidPayload(String),
}

#[derive(Deserialize)]
struct ChatPayload {
    #[serde(default)]
    message: ChatContent,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Deserialize, Default)]
struct ChatContent {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct HistoryEntry {
    role: MessageRole,
    content: String,
}

/// Parse one text frame from a client.
///
/// Frames without a `type` field but with a `content` string are accepted as
/// chat messages without history.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;

    match value.get("type") {
        Some(Value::String(kind)) => match kind.as_str() {
            "chat_message" => parse_chat(value),
            "ping" => Ok(ClientMessage::Ping),
            other => Err(ProtocolError::UnsupportedType(other.to_string())),
        },
        Some(other) => Err(ProtocolError::UnsupportedType(other.to_string())),
        None => match value.get("content").and_then(Value::as_str) {
            Some(content) => Ok(ClientMessage::Chat {
                content: content.to_string(),
                history: Vec::new(),
            }),
            None => Err(ProtocolError::InvalidPayload(
                "missing message type".to_string(),
            )),
        },
    }
}

fn parse_chat(value: Value) -> Result<ClientMessage, ProtocolError> {
    let payload: ChatPayload =
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;

    let history = payload
        .history
        .into_iter()
        .map(|entry| Message {
            role: entry.role,
            content: entry.content,
        })
        .collect();

    Ok(ClientMessage::Chat {
        content: payload.message.content,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_messages_carry_type_field() {
        let chunk = ServerMessage::Chunk {
            message_id: "m1".to_string(),
            content: "Hello ".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({"type": "chunk", "message_id": "m1", "content": "Hello "})
        );

        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).unwrap(),
            json!({"type": "pong"})
        );
    }

    #[test]
    fn test_detected_preserves_parameter_order() {
        let mut parameters = IndexMap::new();
        parameters.insert("zeta".to_string(), "1".to_string());
        parameters.insert("alpha".to_string(), "2".to_string());
        let detected = ServerMessage::Detected {
            message_id: "m1".to_string(),
            tool_name: "generate_quote".to_string(),
            status: "Generating Quote".to_string(),
            message: "Creating your quote document...".to_string(),
            parameters,
        };
        let text = serde_json::to_string(&detected).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
        assert!(text.starts_with(r#"{"type":"detected""#));
    }

    #[test]
    fn test_tool_completed_shape() {
        let mut data = Map::new();
        data.insert("quote_id".to_string(), json!("q-1"));
        let completed = ServerMessage::ToolCompleted {
            message_id: "m1".to_string(),
            tool_name: "generate_quote".to_string(),
            file_path: Some("http://localhost:8000/download/q.json".to_string()),
            data,
        };
        let value = serde_json::to_value(&completed).unwrap();
        assert_eq!(value["type"], "tool_completed");
        assert_eq!(value["data"]["quote_id"], "q-1");
        assert_eq!(completed.kind(), "tool_completed");
    }

    #[test]
    fn test_parse_chat_message_with_history() {
        let text = json!({
            "type": "chat_message",
            "message": {"id": "1", "content": "Make a quote", "timestamp": "now"},
            "history": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"}
            ]
        })
        .to_string();

        let parsed = parse_client_message(&text).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Chat {
                content: "Make a quote".to_string(),
                history: vec![Message::user("Hi"), Message::assistant("Hello!")],
            }
        );
    }

    #[test]
    fn test_parse_ping_and_legacy_form() {
        assert_eq!(
            parse_client_message(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            parse_client_message(r#"{"content":"hello"}"#).unwrap(),
            ClientMessage::Chat {
                content: "hello".to_string(),
                history: Vec::new(),
            }
        );
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let err = parse_client_message("not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON format");

        let err = parse_client_message(r#"{"type":"subscribe"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported message type: subscribe");

        let err = parse_client_message(r#"{"hello":"there"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload(_)));

        let err = parse_client_message(
            r#"{"type":"chat_message","message":{"content":"x"},"history":[{"role":"wizard","content":"y"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload(_)));
    }
}
