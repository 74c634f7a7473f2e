//! In-process log stream service
//!
//! [`InMemoryLogService`] implements the remote protocol with the same
//! sequencing rules as the real service: every accepted write advances the
//! stream's upload token, a write carrying a stale token is rejected, and a
//! write replaying an already used token is reported as already accepted.
//! It backs local development and tests, and can inject failures.
//!
//! Accepted events are kept for the lifetime of the service. The call log
//! and the set of spent tokens are capped at [`CALL_LOG_LIMIT`] and
//! [`USED_TOKEN_LIMIT`] entries.

use super::client::{
    LogStreamClient, LogStreamDescription, LogStreamTarget, PutLogEventsRequest,
    PutLogEventsResponse,
};
use crate::core::{LogEvent, RemoteError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Most recent calls kept for [`InMemoryLogService::calls`]
pub const CALL_LOG_LIMIT: usize = 10_000;

/// Spent tokens remembered per stream to recognize replays
pub const USED_TOKEN_LIMIT: usize = 1_024;

#[derive(Debug, Default)]
struct StreamRecord {
    events: Vec<LogEvent>,
    upload_sequence_token: Option<String>,
    used_tokens: VecDeque<String>,
}

#[derive(Debug, Default)]
struct GroupRecord {
    retention_days: Option<u32>,
    streams: BTreeMap<String, StreamRecord>,
}

#[derive(Debug, Default)]
struct ServiceState {
    groups: HashMap<String, GroupRecord>,
    next_token: u64,
    put_failures: VecDeque<RemoteError>,
    provisioning_failure: Option<RemoteError>,
    describe_failures: VecDeque<RemoteError>,
    calls: VecDeque<&'static str>,
    call_counts: HashMap<&'static str, usize>,
}

impl ServiceState {
    fn issue_token(&mut self) -> String {
        self.next_token += 1;
        format!("{:020}", self.next_token)
    }

    fn stream_mut(&mut self, target: &LogStreamTarget) -> Result<&mut StreamRecord, RemoteError> {
        self.groups
            .get_mut(&target.group)
            .and_then(|group| group.streams.get_mut(&target.stream))
            .ok_or_else(|| RemoteError::ResourceNotFound(format!("log stream {target}")))
    }

    fn accept(&mut self, target: &LogStreamTarget, events: &[LogEvent]) -> Result<String, RemoteError> {
        let token = self.issue_token();
        let stream = self.stream_mut(target)?;
        if let Some(previous) = stream.upload_sequence_token.take() {
            if stream.used_tokens.len() == USED_TOKEN_LIMIT {
                stream.used_tokens.pop_front();
            }
            stream.used_tokens.push_back(previous);
        }
        stream.events.extend_from_slice(events);
        stream.upload_sequence_token = Some(token.clone());
        Ok(token)
    }
}

/// Thread-safe in-memory implementation of [`LogStreamClient`]
#[derive(Debug, Default)]
pub struct InMemoryLogService {
    state: Mutex<ServiceState>,
    put_latency: Mutex<Duration>,
    puts_in_flight: AtomicUsize,
    max_puts_in_flight: AtomicUsize,
}

impl InMemoryLogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `PutLogEvents` calls with the given errors, in order
    pub fn fail_next_puts(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state.lock().put_failures.extend(errors);
    }

    /// Fail the next `DescribeLogStreams` calls with the given errors
    pub fn fail_next_describes(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state.lock().describe_failures.extend(errors);
    }

    /// Make every group, retention and stream creation call fail
    pub fn fail_provisioning(&self, error: Option<RemoteError>) {
        self.state.lock().provisioning_failure = error;
    }

    /// Delay applied inside every `PutLogEvents` call
    pub fn set_put_latency(&self, latency: Duration) {
        *self.put_latency.lock() = latency;
    }

    /// Write to a stream as another process would, advancing its token
    pub fn write_as_other_writer(
        &self,
        target: &LogStreamTarget,
        events: &[LogEvent],
    ) -> Result<(), RemoteError> {
        self.state.lock().accept(target, events).map(|_| ())
    }

    /// Events stored in a stream, in acceptance order
    pub fn events(&self, target: &LogStreamTarget) -> Vec<LogEvent> {
        self.state
            .lock()
            .groups
            .get(&target.group)
            .and_then(|group| group.streams.get(&target.stream))
            .map(|stream| stream.events.clone())
            .unwrap_or_default()
    }

    pub fn has_log_group(&self, group: &str) -> bool {
        self.state.lock().groups.contains_key(group)
    }

    pub fn has_log_stream(&self, target: &LogStreamTarget) -> bool {
        self.state
            .lock()
            .groups
            .get(&target.group)
            .is_some_and(|group| group.streams.contains_key(&target.stream))
    }

    pub fn retention_days(&self, group: &str) -> Option<u32> {
        self.state
            .lock()
            .groups
            .get(group)
            .and_then(|group| group.retention_days)
    }

    /// Current upload token of a stream
    pub fn sequence_token(&self, target: &LogStreamTarget) -> Option<String> {
        self.state
            .lock()
            .stream_mut(target)
            .ok()
            .and_then(|stream| stream.upload_sequence_token.clone())
    }

    /// Operation names of the most recent calls, oldest first
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().copied().collect()
    }

    /// Number of calls received for one operation since creation
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .call_counts
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of `PutLogEvents` calls observed running at once
    pub fn max_concurrent_puts(&self) -> usize {
        self.max_puts_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &'static str) {
        let mut state = self.state.lock();
        if state.calls.len() == CALL_LOG_LIMIT {
            state.calls.pop_front();
        }
        state.calls.push_back(operation);
        *state.call_counts.entry(operation).or_insert(0) += 1;
    }

    fn provisioning_result(&self) -> Result<(), RemoteError> {
        match &self.state.lock().provisioning_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn put_locked(&self, request: PutLogEventsRequest<'_>) -> Result<PutLogEventsResponse, RemoteError> {
        let mut state = self.state.lock();

        if let Some(err) = state.put_failures.pop_front() {
            return Err(err);
        }

        if request.events.is_empty() {
            return Err(RemoteError::InvalidParameter("no log events".into()));
        }
        if request
            .events
            .windows(2)
            .any(|pair| pair[0].timestamp_millis() > pair[1].timestamp_millis())
        {
            return Err(RemoteError::InvalidParameter(
                "log events in a single call must be in chronological order".into(),
            ));
        }

        let stream = state.stream_mut(request.target)?;
        let expected = stream.upload_sequence_token.clone();
        if request.sequence_token != expected.as_deref() {
            let replayed = request
                .sequence_token
                .is_some_and(|token| stream.used_tokens.iter().any(|used| used == token));
            return Err(if replayed {
                RemoteError::DataAlreadyAccepted { expected }
            } else {
                RemoteError::InvalidSequenceToken { expected }
            });
        }

        let token = state.accept(request.target, request.events)?;
        Ok(PutLogEventsResponse {
            next_sequence_token: Some(token),
        })
    }
}

impl LogStreamClient for InMemoryLogService {
    fn create_log_group(&self, group: &str) -> Result<(), RemoteError> {
        self.record("CreateLogGroup");
        self.provisioning_result()?;

        let mut state = self.state.lock();
        if state.groups.contains_key(group) {
            return Err(RemoteError::ResourceAlreadyExists(format!("log group {group}")));
        }
        state.groups.insert(group.to_string(), GroupRecord::default());
        Ok(())
    }

    fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), RemoteError> {
        self.record("PutRetentionPolicy");
        self.provisioning_result()?;

        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(group)
            .ok_or_else(|| RemoteError::ResourceNotFound(format!("log group {group}")))?;
        record.retention_days = Some(days);
        Ok(())
    }

    fn create_log_stream(&self, target: &LogStreamTarget) -> Result<(), RemoteError> {
        self.record("CreateLogStream");
        self.provisioning_result()?;

        let mut state = self.state.lock();
        let group = state
            .groups
            .get_mut(&target.group)
            .ok_or_else(|| RemoteError::ResourceNotFound(format!("log group {}", target.group)))?;
        if group.streams.contains_key(&target.stream) {
            return Err(RemoteError::ResourceAlreadyExists(format!("log stream {target}")));
        }
        group
            .streams
            .insert(target.stream.clone(), StreamRecord::default());
        Ok(())
    }

    fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<LogStreamDescription>, RemoteError> {
        self.record("DescribeLogStreams");

        let mut state = self.state.lock();
        if let Some(err) = state.describe_failures.pop_front() {
            return Err(err);
        }
        let record = state
            .groups
            .get(group)
            .ok_or_else(|| RemoteError::ResourceNotFound(format!("log group {group}")))?;

        Ok(record
            .streams
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, stream)| LogStreamDescription {
                name: name.clone(),
                upload_sequence_token: stream.upload_sequence_token.clone(),
            })
            .collect())
    }

    fn put_log_events(
        &self,
        request: PutLogEventsRequest<'_>,
    ) -> Result<PutLogEventsResponse, RemoteError> {
        self.record("PutLogEvents");

        let in_flight = self.puts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_puts_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let latency = *self.put_latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let result = self.put_locked(request);
        self.puts_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
