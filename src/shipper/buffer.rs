//! Pending event accumulation

use crate::core::{Batch, LogEvent};
use parking_lot::Mutex;

/// Ordered accumulation of events awaiting delivery.
///
/// The buffer is unbounded: it never refuses an event. Pressure is relieved
/// by the flush trigger rather than by rejecting writes, so a long remote
/// outage grows memory until deliveries succeed or spill.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<Vec<LogEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the tail and return the new buffer length
    pub fn append(&self, event: LogEvent) -> usize {
        let mut events = self.events.lock();
        events.push(event);
        events.len()
    }

    /// Atomically take everything buffered as a sorted batch
    ///
    /// This is the only way to observe the buffered events.
    pub fn drain(&self) -> Batch {
        let events = std::mem::take(&mut *self.events.lock());
        Batch::from_events(events)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
