//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("handshake timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] roomcast_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] roomcast_transport::TransportError),
}
