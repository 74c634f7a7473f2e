//! Flush decision policy

use std::time::{Duration, Instant};

/// Decides when buffered events must be sent.
///
/// A flush is due when the buffer holds at least `batch_size` events or
/// when `flush_interval` has passed since the last flush, whichever comes
/// first. Both thresholds are floored at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTrigger {
    batch_size: usize,
    flush_interval: Duration,
}

impl FlushTrigger {
    /// Create a trigger, clamping zero thresholds to 1 (event / second)
    pub fn new(batch_size: usize, flush_interval_secs: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            flush_interval: Duration::from_secs(flush_interval_secs.max(1)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Whether a flush should run given the buffer length and timings
    pub fn should_flush(&self, buffer_len: usize, last_flush_at: Instant, now: Instant) -> bool {
        buffer_len >= self.batch_size
            || now.saturating_duration_since(last_flush_at) >= self.flush_interval
    }
}

impl Default for FlushTrigger {
    fn default() -> Self {
        Self::new(50, 2)
    }
}
