//! Broker serve loop
//!
//! The broker is transport-agnostic: it accepts connections from any
//! [`TransportServer`] implementation. WebSocket is the default transport
//! and gets a convenience constructor.
//!
//! # Example
//!
//! ```no_run
//! use roomcast_broker::{Broker, BrokerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::new(BrokerConfig::default());
//!     let notifier = broker.notifier();
//!
//!     // hand `notifier` to route handlers, then serve
//!     broker.serve_websocket("0.0.0.0:7480").await?;
//!     Ok(())
//! }
//! ```

use bytes::Bytes;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use roomcast_core::{codec, Message, PROTOCOL_VERSION};
use roomcast_transport::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "websocket")]
use roomcast_transport::WebSocketServer;

use crate::connection::Connection;
use crate::error::Result;
use crate::notifier::Notifier;
use crate::registry::ConnectionRegistry;
use crate::router::RoomRouter;

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Server name, echoed in WELCOME replies
    pub name: String,
    /// Maximum simultaneous connections; extra accepts are refused
    pub max_connections: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "Roomcast Broker".to_string(),
            max_connections: 1024,
        }
    }
}

/// Room-based notification broker
pub struct Broker {
    config: BrokerConfig,
    /// Live connections and room memberships
    registry: Arc<ConnectionRegistry>,
    /// Membership writer
    router: Arc<RoomRouter>,
    /// Serving flag, shared with every notifier handle
    running: Arc<RwLock<bool>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(RoomRouter::new(registry.clone()));
        Self {
            config,
            registry,
            router,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Send handle for route handlers
    ///
    /// Cheap to clone and valid for the broker's lifetime; sends through
    /// it fail with `Uninitialized` until the broker is serving.
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.registry.clone(), self.running.clone())
    }

    /// Serve using any TransportServer implementation
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        if let Ok(addr) = server.local_addr() {
            info!("Broker '{}' accepting connections on {}", self.config.name, addr);
        }
        *self.running.write() = true;

        while *self.running.read() {
            match server.accept().await {
                Ok((sender, receiver, addr)) => {
                    let sender: Arc<dyn TransportSender> = Arc::new(sender);

                    if self.registry.len() >= self.config.max_connections {
                        warn!(
                            "Connection from {} refused: at capacity ({})",
                            addr, self.config.max_connections
                        );
                        let _ = sender.close().await;
                        continue;
                    }

                    info!("New connection from {}", addr);
                    self.handle_connection(sender, receiver, addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Serve over WebSocket (default transport)
    #[cfg(feature = "websocket")]
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        self.serve_on(server).await
    }

    /// Handle a new connection
    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let registry = Arc::clone(&self.registry);
        let router = Arc::clone(&self.router);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            // The connection exists (and owns its session room) before any
            // registration arrives.
            let connection = Arc::new(Connection::new(sender));
            registry.insert(connection.clone());
            debug!("Connection {} opened from {}", connection.id, addr);

            while *running.read() {
                match receiver.recv().await {
                    Some(TransportEvent::Data(data)) => match codec::decode(&data) {
                        Ok(message) => {
                            if let Some(reply) = handle_message(&message, &connection, &router, &config)
                            {
                                if let Err(e) = connection.send(reply).await {
                                    error!("Send error to {}: {}", connection.id, e);
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Decode error from {}: {}", addr, e);
                        }
                    },
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!("Client {} disconnected: {:?}", addr, reason);
                        break;
                    }
                    Some(TransportEvent::Error(e)) => {
                        error!("Transport error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            info!(
                "Removing connection {} (lived {:?}, idle {:?})",
                connection.id,
                connection.created_at.elapsed(),
                connection.idle_duration()
            );
            registry.remove(&connection.id);
        });
    }

    /// Stop the broker; held notifiers drop back to `Uninitialized`
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// Check if the broker is serving
    pub fn is_serving(&self) -> bool {
        *self.running.read()
    }

    /// Live connection count
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Non-empty room count
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

/// Handle an incoming message, returning the reply to write back
fn handle_message(
    message: &Message,
    connection: &Arc<Connection>,
    router: &RoomRouter,
    config: &BrokerConfig,
) -> Option<Bytes> {
    connection.touch();

    match message {
        Message::Register(register) => {
            if register.version != PROTOCOL_VERSION {
                warn!(
                    "Client {} speaks protocol v{}, broker is v{}",
                    connection.id, register.version, PROTOCOL_VERSION
                );
            }

            // Rooms are reshaped before the WELCOME goes out, so a client
            // that saw its welcome is already reachable through its rooms.
            let identity = register.identity();
            router.register(&connection.id, &identity);
            connection.set_identity(identity);

            let welcome = connection.welcome_message(&config.name);
            codec::encode(&welcome).ok()
        }

        Message::Ping => codec::encode(&Message::Pong).ok(),

        other => {
            debug!(
                "Ignoring unexpected {} from {}",
                other.type_name(),
                connection.id
            );
            None
        }
    }
}
