//! Integration tests for the log shipper
//!
//! These tests verify:
//! - Size and time based flush triggers
//! - Sequence token conflict recovery
//! - Retry exhaustion and local fallback
//! - Idle flushes
//! - Final flush on shutdown and drop
//! - Configuration driven construction

use rust_log_shipper::core::{LogEntry, LogEvent, LogLevel, RemoteError};
use rust_log_shipper::shipper::{
    CloudWatchHandler, InMemoryLogService, LogStreamClient, LogStreamTarget, RetryPolicy,
    ShipperConfig,
};
use rust_log_shipper::Appender;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn target() -> LogStreamTarget {
    LogStreamTarget::new("my-app", "web")
}

fn no_backoff() -> RetryPolicy {
    RetryPolicy::default().with_base_delay(Duration::ZERO)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_batch_size_triggers_flush() {
    let service = Arc::new(InMemoryLogService::new());
    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(5)
        .flush_interval(Duration::from_secs(3600))
        .build()
        .expect("Failed to build handler");

    for i in 0..5 {
        handler.emit(1_000 + i, format!("Message {}", i));
    }

    assert!(
        wait_until(Duration::from_secs(5), || service.events(&target()).len() == 5),
        "5 appends with batch size 5 should flush automatically"
    );
    assert_eq!(service.call_count("PutLogEvents"), 1);
}

#[test]
fn test_flush_interval_triggers_flush() {
    let service = Arc::new(InMemoryLogService::new());
    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(50)
        .flush_interval(Duration::from_secs(2))
        .build()
        .expect("Failed to build handler");

    let started = Instant::now();
    handler.emit(1, "lonely event");

    thread::sleep(Duration::from_millis(500));
    assert!(service.events(&target()).is_empty(), "flushed too early");

    assert!(wait_until(Duration::from_secs(5), || service
        .events(&target())
        .len()
        == 1));
    assert!(started.elapsed() >= Duration::from_millis(1900));
}

#[test]
fn test_delivered_batches_are_time_ordered() {
    let service = Arc::new(InMemoryLogService::new());
    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .build()
        .expect("Failed to build handler");

    handler.emit(30, "c");
    handler.emit(10, "a-1");
    handler.emit(20, "b");
    handler.emit(10, "a-2");
    handler.flush();

    let messages: Vec<String> = service
        .events(&target())
        .iter()
        .map(|e| e.message().to_string())
        .collect();
    assert_eq!(messages, vec!["a-1", "a-2", "b", "c"]);
}

#[test]
fn test_token_conflict_recovery() {
    let service = Arc::new(InMemoryLogService::new());
    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .retry_policy(no_backoff())
        .build()
        .expect("Failed to build handler");

    handler.emit(1, "first");
    handler.flush();

    // Another process writes to the same stream, invalidating our token
    service
        .write_as_other_writer(&target(), &[LogEvent::new(2, "foreign")])
        .unwrap();

    let puts_before = service.call_count("PutLogEvents");
    let describes_before = service.call_count("DescribeLogStreams");

    handler.emit(3, "second");
    handler.flush();

    assert_eq!(service.call_count("PutLogEvents") - puts_before, 2);
    assert_eq!(service.call_count("DescribeLogStreams") - describes_before, 1);

    let messages: Vec<String> = service
        .events(&target())
        .iter()
        .map(|e| e.message().to_string())
        .collect();
    assert_eq!(messages, vec!["first", "foreign", "second"]);
}

#[test]
fn test_retry_exhaustion_spills_to_fallback() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let fallback = temp_dir.path().join("logs/cloudwatch-fallback.log");

    let service = Arc::new(InMemoryLogService::new());
    service.fail_next_puts((0..3).map(|_| RemoteError::Throttled("Rate exceeded".into())));

    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .fallback_path(Some(fallback.clone()))
        .retry_policy(no_backoff())
        .build()
        .expect("Failed to build handler");

    for i in 0..4 {
        handler.emit(1_736_332_245_000 + i, format!("{{\"n\":{}}}\n", i));
    }
    handler.flush();

    assert_eq!(service.call_count("PutLogEvents"), 3);
    assert!(service.events(&target()).is_empty());

    let content = fs::read_to_string(&fallback).expect("Failed to read fallback file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.starts_with('['));
        assert!(line.ends_with(&format!("] {{\"n\":{}}}", i)), "line {i}: {line}");
    }

    // The spilled batch is never retried
    handler.flush();
    assert_eq!(service.call_count("PutLogEvents"), 3);
}

#[test]
fn test_exhaustion_without_fallback_is_silent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let service = Arc::new(InMemoryLogService::new());
    service.fail_next_puts((0..3).map(|_| RemoteError::Transport("unreachable".into())));

    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .fallback_path(None)
        .retry_policy(no_backoff())
        .build()
        .expect("Failed to build handler");

    handler.emit(1, "dropped");
    handler.flush();

    assert_eq!(service.call_count("PutLogEvents"), 3);
    assert_eq!(handler.pending(), 0);
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_idle_flush_is_local() {
    let service = Arc::new(InMemoryLogService::new());
    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .build()
        .expect("Failed to build handler");

    let before = handler.last_flush_at();
    thread::sleep(Duration::from_millis(5));
    handler.flush();

    assert!(handler.last_flush_at() > before);
    assert!(service.calls().is_empty(), "idle flush must not touch the service");
}

#[test]
fn test_provisioning_failures_do_not_block_delivery() {
    let service = Arc::new(InMemoryLogService::new());
    // Group left over from a previous run
    service.create_log_group("my-app").unwrap();

    let handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .retention_days(30)
        .build()
        .expect("Failed to build handler");

    handler.emit(1, "after restart");
    handler.flush();

    assert_eq!(service.events(&target()).len(), 1);
    assert_eq!(service.retention_days("my-app"), Some(30));
}

#[test]
fn test_graceful_shutdown() {
    let service = Arc::new(InMemoryLogService::new());

    {
        let handler = CloudWatchHandler::builder(Arc::clone(&service))
            .target(target())
            .batch_size(100)
            .flush_interval(Duration::from_secs(3600))
            .build()
            .expect("Failed to build handler");

        for i in 0..10 {
            handler.emit(i, format!("Message {}", i));
        }

        // Handler drops here - should flush and shutdown gracefully
    }

    let events = service.events(&target());
    assert_eq!(events.len(), 10, "All events should be shipped before shutdown");
    assert_eq!(service.call_count("PutLogEvents"), 1, "exactly one final flush");
}

#[test]
fn test_shutdown_is_bounded_by_timeout() {
    let service = Arc::new(InMemoryLogService::new());
    service.fail_next_puts((0..3).map(|_| RemoteError::Throttled("slow".into())));

    let mut handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .retry_policy(RetryPolicy::new(3, Duration::from_secs(2)))
        .build()
        .expect("Failed to build handler");

    handler.emit(1, "stuck");

    let started = Instant::now();
    let completed = handler.shutdown(Duration::from_millis(300));

    assert!(!completed);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_from_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = ShipperConfig {
        group_name: "billing".into(),
        stream_name: "worker".into(),
        retention_days: 0,
        batch_size: 0,
        fallback_path: Some(temp_dir.path().join("fallback.log")),
        ..ShipperConfig::default()
    };

    let service = Arc::new(InMemoryLogService::new());
    let handler =
        CloudWatchHandler::from_config(&config, Arc::clone(&service)).expect("Failed to build");

    // Batch size 0 is clamped to 1: every event flushes
    handler.emit(1, "one");
    let worker = LogStreamTarget::new("billing", "worker");
    assert!(wait_until(Duration::from_secs(5), || service.events(&worker).len() == 1));
    assert_eq!(service.call_count("PutRetentionPolicy"), 0);
    assert_eq!(handler.target(), &worker);
}

#[test]
fn test_appender_entries_are_shipped() {
    let service = Arc::new(InMemoryLogService::new());
    let mut handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target())
        .batch_size(100)
        .build()
        .expect("Failed to build handler");

    let entry = LogEntry::new(LogLevel::Error, "payment failed").with_field("order", "A-17");
    handler.append(&entry).unwrap();
    Appender::flush(&mut handler).unwrap();

    let events = service.events(&target());
    assert_eq!(events.len(), 1);
    let value: serde_json::Value = serde_json::from_str(events[0].message().trim_end()).unwrap();
    assert_eq!(value["level"], "ERROR");
    assert_eq!(value["context"]["order"], "A-17");
}
