//! Timing utilities
//!
//! Notice timestamps are server-assigned Unix time in microseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp type (microseconds since the Unix epoch)
pub type Timestamp = u64;

/// Get current Unix timestamp in microseconds
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as Timestamp
}

/// Convert microseconds to Duration
pub fn to_duration(micros: Timestamp) -> Duration {
    Duration::from_micros(micros)
}
