//! Roomcast Client Library
//!
//! Async client for the Roomcast notification protocol. The client owns
//! one connection per instance and keeps a durable registry of named
//! event handlers: handlers registered with [`Roomcast::on`] stay put
//! across [`Roomcast::disconnect`] / [`Roomcast::connect`] cycles, so a
//! reconnect never needs to re-register them.
//!
//! # Example
//!
//! ```ignore
//! use roomcast_client::Roomcast;
//! use roomcast_core::Identity;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Roomcast::new("ws://localhost:7480");
//!
//!     client.on("announcement", |notice| {
//!         println!("[{}] {}", notice.title, notice.message);
//!     });
//!
//!     client.connect(Identity::new("user-42", "creator")).await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod error;

pub use builder::RoomcastBuilder;
pub use client::{EventHandler, Roomcast};
pub use error::{ClientError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::RoomcastBuilder;
    pub use crate::client::Roomcast;
    pub use crate::error::{ClientError, Result};
    pub use roomcast_core::{Identity, Notice};
}
