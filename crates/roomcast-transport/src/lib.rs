//! Roomcast Transport Layer
//!
//! Transport abstraction the broker and client speak through. WebSocket is
//! the primary (and currently only) implementation; the traits keep the
//! broker's accept loop and the client's connection logic independent of
//! the concrete socket type.

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketServer, WebSocketTransport};
