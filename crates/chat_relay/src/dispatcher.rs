use crate::directives::Directive;
use crate::hub::ConnectionHub;
use crate::protocol::ServerMessage;
use crate::tools::{HandlerRegistry, ToolError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs directive handlers in the background and reports their progress to
/// the requesting client.
#[derive(Clone)]
pub struct ToolDispatcher {
    handlers: Arc<HandlerRegistry>,
    hub: Arc<ConnectionHub>,
}

impl ToolDispatcher {
    pub fn new(handlers: Arc<HandlerRegistry>, hub: Arc<ConnectionHub>) -> Self {
        Self { handlers, hub }
    }

    /// Announce the directive right away, then execute it on a spawned task.
    /// The outcome arrives at the client as `tool_completed` or `tool_failed`.
    pub fn dispatch(&self, directive: Directive, client_id: &str, message_id: &str) {
        let (status, message) = self.handlers.status_text(&directive.name);
        info!(
            "Dispatching {} for client {} (message {})",
            directive.name, client_id, message_id
        );
        self.hub.send(
            client_id,
            ServerMessage::Detected {
                message_id: message_id.to_string(),
                tool_name: directive.name.clone(),
                status: status.to_string(),
                message: message.to_string(),
                parameters: directive.parameters.clone(),
            },
        );

        let handlers = self.handlers.clone();
        let hub = self.hub.clone();
        let client_id = client_id.to_string();
        let message_id = message_id.to_string();

        tokio::spawn(async move {
            let result = AssertUnwindSafe(handlers.execute(&directive.name, &directive.parameters))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(ToolError::Execution(anyhow::anyhow!(
                        "Handler for {} panicked",
                        directive.name
                    )))
                });

            let notification = match result {
                Ok(output) => {
                    info!("{} completed for client {}", directive.name, client_id);
                    ServerMessage::ToolCompleted {
                        message_id,
                        tool_name: directive.name,
                        file_path: output.file_path,
                        data: output.data,
                    }
                }
                Err(e) => {
                    error!("{} failed for client {}: {}", directive.name, client_id, e);
                    ServerMessage::ToolFailed {
                        message_id,
                        tool_name: directive.name,
                        error: e.to_string(),
                    }
                }
            };

            if !hub.send(&client_id, notification) {
                debug!("Client {} left before its tool result arrived", client_id);
            }
        });
    }
}
