//! The shipping handler
//!
//! Producers call [`CloudWatchHandler::emit`], which only appends to the
//! buffer and, when the flush trigger fires, nudges a dedicated worker
//! thread. The worker drains the buffer, provisions the stream on first
//! use, delivers with retries and spills to the fallback file when the
//! retry budget runs out.
//!
//! All flushes, from the worker or from direct [`flush`](CloudWatchHandler::flush)
//! calls, run under one lock so there is never more than one delivery in
//! flight for the stream: the sequence token only stays consistent if
//! remote writes happen strictly one after another.

use super::buffer::EventBuffer;
use super::client::{LogStreamClient, LogStreamTarget};
use super::config::{Provider, ShipperConfig};
use super::fallback::FallbackSpiller;
use super::initializer::StreamInitializer;
use super::retry::{DeliveryOutcome, DeliveryRetrier, RetryPolicy};
use super::sequence::SequenceTokenManager;
use super::trigger::FlushTrigger;
use crate::core::{LogEvent, Result, ShipperError, TimestampFormat};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default upper bound on the final flush when the handler is dropped
/// without an explicit [`shutdown`](CloudWatchHandler::shutdown)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-stream delivery state, only touched while holding the flush lock
#[derive(Debug)]
struct StreamState {
    initializer: StreamInitializer,
    tokens: SequenceTokenManager,
}

struct Shared {
    target: LogStreamTarget,
    client: Arc<dyn LogStreamClient>,
    buffer: EventBuffer,
    trigger: FlushTrigger,
    retrier: DeliveryRetrier,
    spiller: FallbackSpiller,
    last_flush_at: Mutex<Instant>,
    stream: Mutex<StreamState>,
    stopped: AtomicBool,
}

impl Shared {
    fn last_flush_at(&self) -> Instant {
        *self.last_flush_at.lock()
    }

    fn flush(&self) {
        let mut state = self.stream.lock();
        self.flush_locked(&mut state);
    }

    fn flush_locked(&self, state: &mut StreamState) {
        let batch = self.buffer.drain();
        *self.last_flush_at.lock() = Instant::now();

        if batch.is_empty() {
            return;
        }

        state
            .initializer
            .ensure_ready(self.client.as_ref(), &self.target, &mut state.tokens);

        let outcome =
            self.retrier
                .deliver(self.client.as_ref(), &self.target, &mut state.tokens, &batch);

        if let DeliveryOutcome::Exhausted {
            attempts,
            last_error,
        } = outcome
        {
            error!(
                stream = %self.target,
                events = batch.len(),
                span = ?batch.time_span(),
                attempts,
                error = %last_error,
                "delivery retries exhausted, spilling batch to fallback"
            );
            self.spiller.spill(&batch);
        }
    }

    fn run_worker(&self, signals: Receiver<()>) {
        let interval = self.trigger.flush_interval();

        loop {
            let deadline = self.last_flush_at() + interval;
            match signals.recv_deadline(deadline) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => self.flush(),
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    debug!(stream = %self.target, "shipper worker stopped");
                    break;
                }
            }
        }
    }
}

/// Ships log events to one remote log stream.
///
/// # Example
///
/// ```
/// use rust_log_shipper::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let service = Arc::new(InMemoryLogService::new());
/// let mut handler = CloudWatchHandler::builder(Arc::clone(&service))
///     .target(LogStreamTarget::new("my-app", "web"))
///     .batch_size(10)
///     .build()
///     .expect("worker thread starts");
///
/// handler.emit(1_736_332_245_123, "user signed in\n");
/// assert!(handler.shutdown(Duration::from_secs(5)));
///
/// let target = LogStreamTarget::new("my-app", "web");
/// assert_eq!(service.events(&target).len(), 1);
/// ```
pub struct CloudWatchHandler {
    shared: Arc<Shared>,
    signal: Option<Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
    pub(crate) timestamp_format: TimestampFormat,
}

impl CloudWatchHandler {
    #[must_use]
    pub fn builder<C: LogStreamClient + 'static>(client: C) -> CloudWatchHandlerBuilder {
        CloudWatchHandlerBuilder::new(Arc::new(client))
    }

    /// Build a handler from configuration
    pub fn from_config<C: LogStreamClient + 'static>(
        config: &ShipperConfig,
        client: C,
    ) -> Result<Self> {
        config.validate()?;
        match config.provider {
            Provider::Cloudwatch => info!(
                provider = %config.provider,
                region = %config.region,
                endpoint = config.endpoint.as_deref().unwrap_or("default"),
                group = %config.group_name,
                stream = %config.stream_name,
                "starting log shipper"
            ),
        }

        Self::builder(client)
            .target(LogStreamTarget::new(
                config.group_name.clone(),
                config.stream_name.clone(),
            ))
            .batch_size(config.batch_size())
            .flush_interval(config.flush_interval())
            .retention_days(config.retention_days)
            .fallback_path(config.fallback_path())
            .build()
    }

    pub fn target(&self) -> &LogStreamTarget {
        &self.shared.target
    }

    /// Queue one formatted record for delivery.
    ///
    /// Never blocks on the network and never fails. After shutdown the
    /// record is dropped.
    pub fn emit(&self, timestamp_millis: i64, message: impl Into<String>) {
        if self.shared.stopped.load(Ordering::Acquire) {
            warn!(stream = %self.shared.target, "shipper stopped, dropping event");
            return;
        }

        let len = self
            .shared
            .buffer
            .append(LogEvent::new(timestamp_millis, message));

        if self
            .shared
            .trigger
            .should_flush(len, self.shared.last_flush_at(), Instant::now())
        {
            self.request_flush();
        }
    }

    /// Ask the worker to flush. Coalesces with a request already pending.
    fn request_flush(&self) {
        if let Some(ref sender) = self.signal {
            let _ = sender.try_send(());
        }
    }

    /// Flush on the calling thread, waiting for any flush in progress
    pub fn flush(&self) {
        self.shared.flush();
    }

    /// Number of events waiting in the buffer
    pub fn pending(&self) -> usize {
        self.shared.buffer.len()
    }

    pub fn last_flush_at(&self) -> Instant {
        self.shared.last_flush_at()
    }

    /// Stop the worker and run the final flush, bounded by `timeout`.
    ///
    /// Returns `true` if everything buffered was handed to delivery before
    /// the deadline.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return true;
        }

        let deadline = Instant::now() + timeout;
        let mut completed = true;

        // Closing the channel makes the worker run its final flush and exit
        drop(self.signal.take());

        if let Some(handle) = self.worker.take() {
            loop {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        error!(stream = %self.shared.target, "shipper worker panicked");
                        completed = false;
                    }
                    break;
                }

                if Instant::now() >= deadline {
                    warn!(
                        stream = %self.shared.target,
                        ?timeout,
                        "shipper worker did not finish in time, some events may be lost"
                    );
                    completed = false;
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }

        if Instant::now() >= deadline {
            let pending = self.shared.buffer.len();
            if pending > 0 {
                warn!(stream = %self.shared.target, pending, "deadline passed, final flush skipped");
                completed = false;
            }
            return completed;
        }

        // Picks up anything the worker did not drain; idle otherwise
        match self.shared.stream.try_lock_until(deadline) {
            Some(mut state) => self.shared.flush_locked(&mut state),
            None => {
                warn!(stream = %self.shared.target, "final flush skipped, delivery still in flight");
                completed = false;
            }
        }

        completed
    }
}

impl Drop for CloudWatchHandler {
    fn drop(&mut self) {
        if !self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            let pending = self.shared.buffer.len();
            warn!(
                stream = %self.shared.target,
                pending,
                "shipper dropped before final flush completed"
            );
        }
    }
}

/// Builder for [`CloudWatchHandler`]
pub struct CloudWatchHandlerBuilder {
    client: Arc<dyn LogStreamClient>,
    target: LogStreamTarget,
    batch_size: usize,
    flush_interval: Duration,
    retention_days: i64,
    fallback_path: Option<PathBuf>,
    retry_policy: RetryPolicy,
    timestamp_format: TimestampFormat,
}

impl CloudWatchHandlerBuilder {
    fn new(client: Arc<dyn LogStreamClient>) -> Self {
        let defaults = ShipperConfig::default();
        let batch_size = defaults.batch_size();
        let flush_interval = defaults.flush_interval();
        Self {
            client,
            target: LogStreamTarget::new(defaults.group_name, defaults.stream_name),
            batch_size,
            flush_interval,
            retention_days: defaults.retention_days,
            fallback_path: None,
            retry_policy: RetryPolicy::default(),
            timestamp_format: TimestampFormat::default(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn target(mut self, target: LogStreamTarget) -> Self {
        self.target = target;
        self
    }

    /// Flush once this many events are buffered (minimum 1)
    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Flush once this much time has passed since the last flush.
    /// Rounded down to whole seconds, minimum 1.
    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Retention to declare on the log group; zero or less leaves it as is
    #[must_use = "builder methods return a new value"]
    pub fn retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fallback_path(mut self, path: Option<PathBuf>) -> Self {
        self.fallback_path = path;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Timestamp format used when rendering appended entries
    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Start the worker thread and return the handler
    pub fn build(self) -> Result<CloudWatchHandler> {
        if self.target.group.is_empty() || self.target.stream.is_empty() {
            return Err(ShipperError::config(
                "CloudWatchHandler",
                "log group and stream names must not be empty",
            ));
        }

        let shared = Arc::new(Shared {
            target: self.target,
            client: self.client,
            buffer: EventBuffer::new(),
            trigger: FlushTrigger::new(self.batch_size, self.flush_interval.as_secs()),
            retrier: DeliveryRetrier::new(self.retry_policy),
            spiller: FallbackSpiller::new(self.fallback_path),
            last_flush_at: Mutex::new(Instant::now()),
            stream: Mutex::new(StreamState {
                initializer: StreamInitializer::new(self.retention_days),
                tokens: SequenceTokenManager::new(),
            }),
            stopped: AtomicBool::new(false),
        });

        let (sender, receiver) = bounded(1);
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("log-shipper-{}", shared.target.stream))
            .spawn(move || worker_shared.run_worker(receiver))
            .map_err(|e| {
                ShipperError::io_operation("spawning shipper worker", "cannot start thread", e)
            })?;

        Ok(CloudWatchHandler {
            shared,
            signal: Some(sender),
            worker: Some(worker),
            timestamp_format: self.timestamp_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RemoteError;
    use crate::shipper::memory::InMemoryLogService;
    use tempfile::TempDir;

    fn target() -> LogStreamTarget {
        LogStreamTarget::new("app", "web")
    }

    fn handler(service: &Arc<InMemoryLogService>, batch_size: usize) -> CloudWatchHandler {
        CloudWatchHandler::builder(Arc::clone(service))
            .target(target())
            .batch_size(batch_size)
            .flush_interval(Duration::from_secs(60))
            .retry_policy(RetryPolicy::default().with_base_delay(Duration::ZERO))
            .build()
            .expect("handler builds")
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn test_idle_flush_makes_no_remote_call() {
        let service = Arc::new(InMemoryLogService::new());
        let handler = handler(&service, 10);
        let before = handler.last_flush_at();

        thread::sleep(Duration::from_millis(5));
        handler.flush();

        assert!(handler.last_flush_at() > before);
        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_first_flush_provisions_stream() {
        let service = Arc::new(InMemoryLogService::new());
        let handler = handler(&service, 10);

        handler.emit(1, "a");
        handler.flush();

        assert!(service.has_log_stream(&target()));
        assert_eq!(service.retention_days("app"), Some(14));
        assert_eq!(service.events(&target()).len(), 1);

        handler.emit(2, "b");
        handler.flush();
        assert_eq!(service.call_count("CreateLogGroup"), 1);
        assert_eq!(service.events(&target()).len(), 2);
    }

    #[test]
    fn test_size_trigger_flushes_in_background() {
        let service = Arc::new(InMemoryLogService::new());
        let handler = handler(&service, 5);

        for i in 0..4 {
            handler.emit(i, format!("event {i}"));
        }
        thread::sleep(Duration::from_millis(100));
        assert_eq!(service.call_count("PutLogEvents"), 0);

        handler.emit(4, "event 4");
        assert!(wait_for(|| service.events(&target()).len() == 5));
        assert_eq!(handler.pending(), 0);
    }

    #[test]
    fn test_exhausted_delivery_spills_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("fallback.log");
        let service = Arc::new(InMemoryLogService::new());
        service.fail_next_puts((0..3).map(|_| RemoteError::Transport("down".into())));

        let handler = CloudWatchHandler::builder(Arc::clone(&service))
            .target(target())
            .batch_size(100)
            .fallback_path(Some(path.clone()))
            .retry_policy(RetryPolicy::default().with_base_delay(Duration::ZERO))
            .build()
            .unwrap();

        handler.emit(2, "second\n");
        handler.emit(1, "first\n");
        handler.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
        assert_eq!(service.call_count("PutLogEvents"), 3);
    }

    #[test]
    fn test_shutdown_flushes_trailing_events() {
        let service = Arc::new(InMemoryLogService::new());
        let mut handler = handler(&service, 100);

        handler.emit(1, "tail-1");
        handler.emit(2, "tail-2");
        assert!(handler.shutdown(Duration::from_secs(5)));

        assert_eq!(service.events(&target()).len(), 2);
        assert_eq!(service.call_count("PutLogEvents"), 1);

        // Second shutdown is a no-op, later events are dropped
        assert!(handler.shutdown(Duration::from_secs(1)));
        handler.emit(3, "late");
        assert_eq!(handler.pending(), 0);
    }

    #[test]
    fn test_default_builder_uses_config_defaults() {
        let service = Arc::new(InMemoryLogService::new());
        let builder = CloudWatchHandler::builder(service);

        assert_eq!(builder.target, LogStreamTarget::new("my-app", "web"));
        assert_eq!(builder.batch_size, 50);
        assert_eq!(builder.flush_interval, Duration::from_secs(2));
        assert_eq!(builder.retention_days, 14);
    }

    #[test]
    fn test_shutdown_without_time_left_does_not_deliver() {
        let service = Arc::new(InMemoryLogService::new());
        service.set_put_latency(Duration::from_millis(500));
        let mut handler = handler(&service, 100);

        handler.emit(1, "late");
        let started = Instant::now();
        let completed = handler.shutdown(Duration::ZERO);

        assert!(!completed);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_conflict_on_final_attempt_spills() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("fallback.log");
        let service = Arc::new(InMemoryLogService::new());
        service.fail_next_puts([
            RemoteError::Throttled("slow".into()),
            RemoteError::Transport("reset".into()),
            RemoteError::InvalidSequenceToken { expected: None },
        ]);

        let handler = CloudWatchHandler::builder(Arc::clone(&service))
            .target(target())
            .batch_size(100)
            .fallback_path(Some(path.clone()))
            .retry_policy(RetryPolicy::default().with_base_delay(Duration::ZERO))
            .build()
            .unwrap();

        handler.emit(1, "unlucky\n");
        handler.flush();

        assert_eq!(service.call_count("PutLogEvents"), 3);
        // One lookup while provisioning, one refresh after the final conflict
        assert_eq!(service.call_count("DescribeLogStreams"), 2);
        assert!(service.events(&target()).is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("] unlucky\n"));
    }

    #[test]
    fn test_empty_target_rejected() {
        let service = Arc::new(InMemoryLogService::new());
        let result = CloudWatchHandler::builder(service)
            .target(LogStreamTarget::new("", "web"))
            .build();
        assert!(matches!(
            result,
            Err(ShipperError::InvalidConfiguration { .. })
        ));
    }
}
