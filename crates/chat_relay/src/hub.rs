//! Registry of connected clients and their outbound message queues

use crate::protocol::ServerMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Messages a client may have queued before it is considered stalled
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Connection {
    id: u64,
    sender: mpsc::Sender<ServerMessage>,
}

/// Handed to the socket task when a client connects. Everything sent to the
/// client arrives on `receiver` in send order.
pub struct ClientConnection {
    pub connection_id: u64,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

/// Maps client ids to their live connection.
///
/// Sending never blocks. Messages for clients that are not connected are
/// dropped. A client whose queue is full is disconnected, which closes its
/// receiver.
pub struct ConnectionHub {
    connections: RwLock<HashMap<String, Connection>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a client. A previous connection under the same id is replaced
    /// and its receiver closes.
    pub fn connect(&self, client_id: &str) -> ClientConnection {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections
            .insert(client_id.to_string(), Connection { id, sender })
            .is_some()
        {
            info!("Client {} reconnected, replacing previous connection", client_id);
        }
        info!(
            "Client {} connected. Total connections: {}",
            client_id,
            connections.len()
        );

        ClientConnection {
            connection_id: id,
            receiver,
        }
    }

    /// Remove a client, unless it has reconnected since `connection_id` was issued.
    pub fn disconnect(&self, client_id: &str, connection_id: u64) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections
            .get(client_id)
            .is_some_and(|connection| connection.id == connection_id)
        {
            connections.remove(client_id);
            info!(
                "Client {} disconnected. Total connections: {}",
                client_id,
                connections.len()
            );
        }
    }

    /// Queue a message for a client. Returns false if the client is gone or
    /// was dropped for not keeping up.
    pub fn send(&self, client_id: &str, message: ServerMessage) -> bool {
        let overflowed = {
            let connections = self
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(connection) = connections.get(client_id) else {
                debug!("Dropping {} for disconnected client {}", message.kind(), client_id);
                return false;
            };
            match connection.sender.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Closed(_)) => return false,
                Err(TrySendError::Full(message)) => {
                    warn!(
                        "Queue for client {} is full ({} messages), dropping {} and disconnecting",
                        client_id,
                        self.queue_capacity,
                        message.kind()
                    );
                    connection.id
                }
            }
        };
        self.disconnect(client_id, overflowed);
        false
    }

    pub fn active_connections(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
