//! Per-key tracking entry implementation.

use std::time::Duration;
use tokio::time::Instant;

/// Tracks requests observed from a single key within the current window.
///
/// An entry is created on a key's first request. It is reset in place when a
/// request arrives after the window has expired, or removed entirely by the
/// eviction sweep; it never outlives the process.
#[derive(Debug, Clone)]
pub struct TrackingEntry {
    /// Requests observed in the current window
    count: u64,
    /// When the current window started
    window_start: Instant,
}

impl TrackingEntry {
    /// Create a new entry counting its first request.
    pub fn new() -> Self {
        Self {
            count: 1,
            window_start: Instant::now(),
        }
    }

    /// Restart the window, counting the request that triggered the reset.
    pub fn reset(&mut self) {
        self.count = 1;
        self.window_start = Instant::now();
    }

    /// Record one more request in the current window.
    pub fn increment(&mut self) {
        self.count += 1;
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the window this entry started has fully elapsed.
    pub fn is_expired(&self, window: Duration) -> bool {
        self.window_start.elapsed() > window
    }
}

impl Default for TrackingEntry {
    fn default() -> Self {
        Self::new()
    }
}
