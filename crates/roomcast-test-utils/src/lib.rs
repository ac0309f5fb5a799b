//! Common test helpers for Roomcast tests
//!
//! Provides:
//! - Condition-based waiting (no hardcoded sleeps in assertions)
//! - A broker harness with RAII cleanup
//! - Notice collectors for handler testing

use roomcast_broker::{Broker, BrokerConfig, Notifier};
use roomcast_client::{ClientError, Roomcast};
use roomcast_core::{Identity, Notice};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait for a boolean flag to become true
pub async fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(
        || async { flag.load(Ordering::SeqCst) },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait with notification - more efficient than polling
pub async fn wait_with_notify(notify: &Notify, max_wait: Duration) -> bool {
    timeout(max_wait, notify.notified()).await.is_ok()
}

// ============================================================================
// Test Broker - RAII wrapper with proper cleanup
// ============================================================================

/// A test broker that automatically cleans up on drop
pub struct TestBroker {
    broker: Arc<Broker>,
    port: u16,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestBroker {
    /// Start a test broker with default configuration
    pub async fn start() -> Self {
        Self::start_with_config(BrokerConfig {
            name: "Test Broker".to_string(),
            max_connections: 100,
        })
        .await
    }

    /// Start a test broker with custom configuration
    pub async fn start_with_config(config: BrokerConfig) -> Self {
        let port = find_available_port().await;
        let addr = format!("127.0.0.1:{}", port);

        let broker = Arc::new(Broker::new(config));
        let serve = broker.clone();
        let handle = tokio::spawn(async move {
            let _ = serve.serve_websocket(&addr).await;
        });

        // The port is reachable once the listener is bound
        let reachable = wait_for(
            || async move {
                tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
                    .await
                    .is_ok()
            },
            DEFAULT_CHECK_INTERVAL,
            Duration::from_secs(5),
        )
        .await;
        assert!(reachable, "test broker never started listening");

        Self {
            broker,
            port,
            handle: Some(handle),
        }
    }

    /// Get the WebSocket URL for this broker
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send handle into the broker's rooms
    pub fn notifier(&self) -> Notifier {
        self.broker.notifier()
    }

    /// Live connection count
    pub fn connection_count(&self) -> usize {
        self.broker.connection_count()
    }

    /// Wait until the broker sees exactly `n` live connections
    pub async fn wait_for_connections(&self, n: usize, max_wait: Duration) -> bool {
        let broker = self.broker.clone();
        wait_for(
            || {
                let broker = broker.clone();
                async move { broker.connection_count() == n }
            },
            DEFAULT_CHECK_INTERVAL,
            max_wait,
        )
        .await
    }

    /// Connect and register a client against this broker
    pub async fn connect_client(&self, identity: Identity) -> Result<Roomcast, ClientError> {
        let client = Roomcast::new(&self.url());
        client.connect(identity).await?;
        Ok(client)
    }

    /// Stop the broker explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.broker.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Notice Collector - for verifying delivered events
// ============================================================================

/// Collector for notices delivered to a client handler
#[derive(Clone, Default)]
pub struct NoticeCollector {
    notices: Arc<parking_lot::Mutex<Vec<Notice>>>,
    notify: Arc<Notify>,
    count: Arc<AtomicU32>,
}

impl NoticeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler closure for `Roomcast::on`
    pub fn handler(&self) -> impl Fn(Notice) + Send + Sync + 'static {
        let notices = self.notices.clone();
        let notify = self.notify.clone();
        let count = self.count.clone();

        move |notice| {
            notices.lock().push(notice);
            count.fetch_add(1, Ordering::SeqCst);
            notify.notify_waiters();
        }
    }

    /// Number of notices received
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for at least n notices to arrive
    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    /// All collected notices
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Last notice received, if any
    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    /// Check whether a notice with the given title arrived
    pub fn has_title(&self, title: &str) -> bool {
        self.notices.lock().iter().any(|n| n.title == title)
    }

    /// Clear all collected notices
    pub fn clear(&self) {
        self.notices.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}
