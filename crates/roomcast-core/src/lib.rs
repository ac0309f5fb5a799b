//! Roomcast Core
//!
//! Core types, encoding, and protocol primitives for Roomcast v1, a
//! room-based realtime notification protocol.
//!
//! This crate provides:
//! - Protocol message types ([`Message`], [`Notice`], [`Identity`])
//! - Room naming and cohort mapping ([`room`], [`Role`], [`Target`])
//! - MessagePack encoding/decoding ([`codec`])
//! - Timing utilities ([`Timestamp`])

pub mod codec;
pub mod error;
pub mod room;
pub mod time;
pub mod types;

pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use room::{Role, Target, CATCH_ALL};
pub use time::Timestamp;
pub use types::*;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 7480;

/// WebSocket subprotocol identifier
pub const WS_SUBPROTOCOL: &str = "roomcast.v1";
