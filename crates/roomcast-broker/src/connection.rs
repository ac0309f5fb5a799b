//! Connection handles

use bytes::Bytes;
use parking_lot::RwLock;
use roomcast_core::{time, Identity, Message, WelcomeMessage, PROTOCOL_VERSION};
use roomcast_transport::TransportSender;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Session identifier
pub type SessionId = String;

/// A live client connection
///
/// Created the moment the transport accepts the socket, before any
/// registration; the registry joins it to its own session-id room on
/// insert. The identity stays `None` until the first REGISTER.
pub struct Connection {
    /// Unique session ID
    pub id: SessionId,
    /// Transport sender for this connection
    sender: Arc<dyn TransportSender>,
    /// Registered identity, if any
    identity: RwLock<Option<Identity>>,
    /// Connection creation time
    pub created_at: Instant,
    /// Last activity time
    last_activity: RwLock<Instant>,
}

impl Connection {
    /// Create a new connection with a fresh session id
    pub fn new(sender: Arc<dyn TransportSender>) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            identity: RwLock::new(None),
            created_at: now,
            last_activity: RwLock::new(now),
        }
    }

    /// Send encoded bytes to this connection
    pub async fn send(&self, data: Bytes) -> Result<(), roomcast_transport::TransportError> {
        self.sender.send(data).await?;
        *self.last_activity.write() = Instant::now();
        Ok(())
    }

    /// Registered identity, if the client has registered
    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    /// Record the identity carried by the latest REGISTER
    pub fn set_identity(&self, identity: Identity) {
        *self.identity.write() = Some(identity);
    }

    /// Create the welcome reply for this connection
    pub fn welcome_message(&self, server_name: &str) -> Message {
        Message::Welcome(WelcomeMessage {
            version: PROTOCOL_VERSION,
            session: self.id.clone(),
            name: server_name.to_string(),
            time: time::now(),
        })
    }

    /// Check if the transport is still connected
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Touch to update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Get idle duration
    pub fn idle_duration(&self) -> std::time::Duration {
        self.last_activity.read().elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &*self.identity.read())
            .finish()
    }
}
