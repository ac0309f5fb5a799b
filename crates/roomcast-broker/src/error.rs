//! Broker error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors from the broker's serve loop and configuration
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] roomcast_transport::TransportError),

    #[error("core protocol error: {0}")]
    Core(#[from] roomcast_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the notifier's send boundary
///
/// Every variant is a logged, silent no-op at the delivery level: nothing
/// panics, nothing is emitted, and the caller may ignore the result when
/// fire-and-forget semantics are enough.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Broker used before the transport is attached (or after stop)
    #[error("broker is not serving")]
    Uninitialized,

    /// Announcement target or notification recipient is unusable
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Payload failed to encode
    #[error("encode failed: {0}")]
    Encode(String),
}
