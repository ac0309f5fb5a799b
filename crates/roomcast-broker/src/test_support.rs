//! Test doubles shared by the unit tests

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use roomcast_core::{codec, Message};
use roomcast_transport::{Result as TransportResult, TransportError, TransportSender};

/// TransportSender that records payloads instead of writing a socket
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<Bytes>>,
    connected: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Decode everything sent so far back into protocol messages
    pub fn messages(&self) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter_map(|bytes| codec::decode(bytes).ok())
            .collect()
    }

    /// Simulate the peer going away
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportSender for RecordingSender {
    async fn send(&self, data: Bytes) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(data);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
