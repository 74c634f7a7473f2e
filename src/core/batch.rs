//! Time-ordered batches detached from the live buffer

use super::log_event::LogEvent;
use std::ops::Deref;

/// Events flushed together in one delivery call.
///
/// A batch is always sorted by ascending timestamp. The sort is stable, so
/// events sharing a timestamp keep their arrival order. The remote stream
/// rejects calls whose events go backwards in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    events: Vec<LogEvent>,
}

impl Batch {
    /// Build a batch from events in arrival order
    pub fn from_events(mut events: Vec<LogEvent>) -> Self {
        events.sort_by_key(LogEvent::timestamp_millis);
        Self { events }
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.events
    }

    /// Timestamp range covered by the batch, if it is non-empty
    pub fn time_span(&self) -> Option<(i64, i64)> {
        let first = self.events.first()?;
        let last = self.events.last()?;
        Some((first.timestamp_millis(), last.timestamp_millis()))
    }
}

impl Deref for Batch {
    type Target = [LogEvent];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}
