//! Roomcast Broker
//!
//! The broker is the server side of Roomcast:
//! - Tracks live connections and their room memberships
//! - Routes registrations into rooms (session, identity, cohort, catch-all)
//! - Fans announcements and notifications out to room members
//!
//! Delivery is best-effort and at-most-once: no persistence, no acks, no
//! replay for members that were offline at emit time.
//!
//! # Example
//!
//! ```no_run
//! use roomcast_broker::{Broker, BrokerConfig};
//! use roomcast_core::AnnouncementRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::new(BrokerConfig::default());
//!
//!     let notifier = broker.notifier();
//!     tokio::spawn(async move {
//!         // typically called from route handlers
//!         let _ = notifier
//!             .send_announcement(AnnouncementRequest::new(
//!                 "Maintenance",
//!                 "Back at noon",
//!                 "all",
//!             ))
//!             .await;
//!     });
//!
//!     broker.serve_websocket("0.0.0.0:7480").await?;
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod connection;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod router;

#[cfg(test)]
mod test_support;

pub use broker::{Broker, BrokerConfig};
pub use connection::{Connection, SessionId};
pub use error::{BrokerError, Result, SendError};
pub use notifier::Notifier;
pub use registry::ConnectionRegistry;
pub use router::RoomRouter;
