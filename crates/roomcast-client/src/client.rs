//! Roomcast client implementation
//!
//! One `Roomcast` owns at most one live connection. Event handlers live in
//! a durable registry keyed by event name, decoupled from the connection:
//! `connect` attaches a fresh transport underneath the same registry, so
//! handlers registered before a disconnect keep firing after a reconnect.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use roomcast_core::{codec, EventMessage, Identity, Message, Notice, RegisterMessage};
use roomcast_transport::{
    Transport, TransportEvent, TransportReceiver, TransportSender, WebSocketTransport,
};

use crate::builder::RoomcastBuilder;
use crate::error::{ClientError, Result};

/// Named event handler stored in the durable registry
pub type EventHandler = Arc<dyn Fn(Notice) + Send + Sync>;

/// A Roomcast client
pub struct Roomcast {
    url: String,
    handshake_timeout: Duration,
    keepalive_interval: Duration,

    /// Session id assigned by the broker's WELCOME
    session_id: Arc<RwLock<Option<String>>>,

    /// Connection-alive state; `connect` is a no-op while this is true
    connected: Arc<RwLock<bool>>,

    /// Transport handle for the active connection
    sender: Arc<RwLock<Option<Arc<dyn TransportSender>>>>,

    /// Durable handler registry - the single source of truth for what
    /// should be listening, consulted at delivery time
    handlers: Arc<DashMap<String, EventHandler>>,

    /// Connection generation counter; a stale reader or keepalive task
    /// from a torn-down connection must not touch newer state
    epoch: Arc<AtomicU64>,
}

impl Roomcast {
    /// Create a client with default options (use the builder for more)
    pub fn new(url: &str) -> Self {
        RoomcastBuilder::new(url).build()
    }

    /// Create a builder
    pub fn builder(url: &str) -> RoomcastBuilder {
        RoomcastBuilder::new(url)
    }

    pub(crate) fn with_options(
        url: &str,
        handshake_timeout: Duration,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            url: url.to_string(),
            handshake_timeout,
            keepalive_interval,
            session_id: Arc::new(RwLock::new(None)),
            connected: Arc::new(RwLock::new(false)),
            sender: Arc::new(RwLock::new(None)),
            handlers: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Connect and register the given identity
    ///
    /// A no-op when the connection is already alive. Every handler in the
    /// durable registry is live on the new connection the moment this
    /// returns; nothing needs re-registering after a reconnect.
    pub async fn connect(&self, identity: Identity) -> Result<()> {
        if *self.connected.read() {
            debug!("Already connected, connect is a no-op");
            return Ok(());
        }

        info!("Connecting to {}", self.url);

        let (sender, mut receiver) = <WebSocketTransport as Transport>::connect(&self.url).await?;
        let sender: Arc<dyn TransportSender> = Arc::new(sender);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Register before anything else; the broker reshapes rooms and
        // answers WELCOME.
        let register = Message::Register(RegisterMessage::new(identity));
        sender
            .send(codec::encode(&register)?)
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;

        let session = match tokio::time::timeout(
            self.handshake_timeout,
            await_welcome(&mut receiver),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                let _ = sender.close().await;
                return Err(e);
            }
            Err(_) => {
                let _ = sender.close().await;
                return Err(ClientError::Timeout);
            }
        };

        info!("Connected, session: {}", session);
        *self.session_id.write() = Some(session);
        *self.sender.write() = Some(sender.clone());
        *self.connected.write() = true;

        self.spawn_reader(receiver, epoch);
        if !self.keepalive_interval.is_zero() {
            self.spawn_keepalive(sender, epoch);
        }

        Ok(())
    }

    /// Tear down the active connection
    ///
    /// The durable handler registry is untouched; the next `connect`
    /// reattaches every handler.
    pub async fn disconnect(&self) {
        // Bump the epoch first so the old reader cannot clobber state
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.connected.write() = false;
        *self.session_id.write() = None;

        let sender = self.sender.write().take();
        if let Some(sender) = sender {
            let _ = sender.close().await;
            info!("Disconnected from {}", self.url);
        }
    }

    /// Register a handler for a named event
    ///
    /// One handler per event name; a second `on` for the same name
    /// replaces the first. Takes effect immediately when connected.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(Notice) + Send + Sync + 'static,
    {
        self.handlers.insert(event.to_string(), Arc::new(handler));
        debug!("Handler registered for '{}'", event);
    }

    /// Remove the handler for a named event, if any
    pub fn off(&self, event: &str) {
        if self.handlers.remove(event).is_some() {
            debug!("Handler removed for '{}'", event);
        }
    }

    /// Re-register a (possibly changed) identity on the live connection
    ///
    /// The broker supersedes the previous membership wholesale and
    /// answers with a fresh WELCOME.
    pub async fn register(&self, identity: Identity) -> Result<()> {
        self.send_message(&Message::Register(RegisterMessage::new(identity)))
            .await
    }

    /// Send a protocol ping; the broker answers with a PONG
    pub async fn ping(&self) -> Result<()> {
        self.send_message(&Message::Ping).await
    }

    /// Check if the connection is alive
    pub fn is_connected(&self) -> bool {
        *self.connected.read()
    }

    /// Session id assigned by the broker, if connected
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Number of handlers in the durable registry
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    async fn send_message(&self, message: &Message) -> Result<()> {
        let sender = self.sender.read().clone();
        match sender {
            Some(sender) => {
                let data = codec::encode(message)?;
                sender
                    .send(data)
                    .await
                    .map_err(|e| ClientError::SendFailed(e.to_string()))
            }
            None => Err(ClientError::NotConnected),
        }
    }

    /// Spawn the reader task for one connection generation
    fn spawn_reader(&self, mut receiver: impl TransportReceiver + 'static, epoch: u64) {
        let handlers = Arc::clone(&self.handlers);
        let connected = Arc::clone(&self.connected);
        let sender = Arc::clone(&self.sender);
        let session_id = Arc::clone(&self.session_id);
        let current_epoch = Arc::clone(&self.epoch);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if current_epoch.load(Ordering::SeqCst) != epoch {
                    break;
                }
                match event {
                    TransportEvent::Data(data) => match codec::decode(&data) {
                        Ok(Message::Event(ev)) => dispatch(&handlers, ev),
                        Ok(Message::Welcome(welcome)) => {
                            // Re-registration acknowledged
                            debug!("Fresh WELCOME, session: {}", welcome.session);
                            *session_id.write() = Some(welcome.session);
                        }
                        Ok(Message::Pong) => debug!("Pong"),
                        Ok(other) => {
                            debug!("Ignoring unexpected {}", other.type_name());
                        }
                        Err(e) => warn!("Decode error: {}", e),
                    },
                    TransportEvent::Disconnected { reason } => {
                        info!("Disconnected: {:?}", reason);
                        break;
                    }
                    TransportEvent::Error(e) => {
                        error!("Transport error: {}", e);
                    }
                    _ => {}
                }
            }

            // Only the generation that still owns the connection may flip
            // the state; a reader outlived by disconnect()/reconnect does
            // nothing.
            if current_epoch.load(Ordering::SeqCst) == epoch {
                *connected.write() = false;
                *sender.write() = None;
                *session_id.write() = None;
            }
        });
    }

    /// Spawn the keepalive task for one connection generation
    fn spawn_keepalive(&self, sender: Arc<dyn TransportSender>, epoch: u64) {
        let interval = self.keepalive_interval;
        let connected = Arc::clone(&self.connected);
        let current_epoch = Arc::clone(&self.epoch);

        tokio::spawn(async move {
            let ping = match codec::encode(&Message::Ping) {
                Ok(bytes) => bytes,
                Err(_) => return,
            };

            loop {
                tokio::time::sleep(interval).await;
                if current_epoch.load(Ordering::SeqCst) != epoch || !*connected.read() {
                    break;
                }
                if sender.send(ping.clone()).await.is_err() {
                    debug!("Keepalive ping failed, stopping");
                    break;
                }
            }
        });
    }
}

impl std::fmt::Debug for Roomcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roomcast")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .field("session_id", &self.session_id())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Wait for the WELCOME reply during the handshake
async fn await_welcome(receiver: &mut impl TransportReceiver) -> Result<String> {
    loop {
        match receiver.recv().await {
            Some(TransportEvent::Data(data)) => match codec::decode(&data) {
                Ok(Message::Welcome(welcome)) => {
                    let offset = roomcast_core::time::now() as i64 - welcome.time as i64;
                    debug!("Welcome from '{}', clock offset ~{} us", welcome.name, offset);
                    return Ok(welcome.session);
                }
                Ok(msg) => debug!("Received during handshake: {}", msg.type_name()),
                Err(e) => warn!("Decode error during handshake: {}", e),
            },
            Some(TransportEvent::Disconnected { reason }) => {
                return Err(ClientError::ConnectionFailed(
                    reason.unwrap_or_else(|| "disconnected".to_string()),
                ));
            }
            Some(TransportEvent::Error(e)) => {
                return Err(ClientError::ConnectionFailed(e));
            }
            None => {
                return Err(ClientError::ConnectionFailed(
                    "connection closed".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Deliver a received event through the durable registry
///
/// The handler is cloned out of the map before invocation so a handler
/// that calls `on`/`off` on the same client never deadlocks the shard.
fn dispatch(handlers: &DashMap<String, EventHandler>, event: EventMessage) {
    let handler = handlers.get(&event.event).map(|h| h.value().clone());
    match handler {
        Some(handler) => handler(event.notice),
        None => debug!("No handler for event '{}', dropped", event.event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn client() -> Roomcast {
        Roomcast::new("ws://localhost:7480")
    }

    #[test]
    fn test_on_replaces_handler_for_same_event() {
        let client = client();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let counter = first.clone();
        client.on("notification", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        client.on("notification", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(client.handler_count(), 1);

        dispatch(
            &client.handlers,
            EventMessage::new("notification", Notice::notification("t", "m", None)),
        );
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_removes_handler() {
        let client = client();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = fired.clone();
        client.on("announcement", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        client.off("announcement");
        client.off("announcement"); // double off is harmless

        assert_eq!(client.handler_count(), 0);
        dispatch(
            &client.handlers,
            EventMessage::new("announcement", Notice::announcement("t", "m")),
        );
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_without_handler_is_silent() {
        let client = client();
        dispatch(
            &client.handlers,
            EventMessage::new("unheard", Notice::announcement("t", "m")),
        );
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let client = client();
        let result = client.ping().await;
        assert!(matches!(result, Err(ClientError::NotConnected)));

        let result = client
            .register(Identity::new("user-1", "user"))
            .await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_keeps_registry() {
        let client = client();
        client.on("announcement", |_| {});
        client.on("notification", |_| {});

        client.disconnect().await;

        assert_eq!(client.handler_count(), 2);
        assert!(!client.is_connected());
        assert!(client.session_id().is_none());
    }
}
