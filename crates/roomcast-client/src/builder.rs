//! Client builder pattern

use std::time::Duration;

use crate::client::Roomcast;

/// Builder for a Roomcast client
pub struct RoomcastBuilder {
    url: String,
    handshake_timeout: Duration,
    keepalive_interval: Duration,
}

impl RoomcastBuilder {
    /// Create a new builder
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            handshake_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
        }
    }

    /// Set the REGISTER/WELCOME handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the protocol keepalive interval (zero disables keepalive)
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Build the client (does not connect)
    pub fn build(self) -> Roomcast {
        Roomcast::with_options(&self.url, self.handshake_timeout, self.keepalive_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = RoomcastBuilder::new("ws://localhost:7480").build();
        assert!(!client.is_connected());
        assert!(client.session_id().is_none());
    }
}
