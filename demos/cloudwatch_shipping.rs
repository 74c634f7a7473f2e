//! Log shipping example
//!
//! Ships records to an in-memory log service, shows sequence token
//! recovery after a foreign write, and spills a batch to the local
//! fallback file when the service keeps failing.
//!
//! Run with: cargo run --example cloudwatch_shipping

use rust_log_shipper::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Shipper - CloudWatch Shipping Example ===\n");

    let config = ShipperConfig::from_env()?;
    let target = LogStreamTarget::new(config.group_name.clone(), config.stream_name.clone());
    let service = Arc::new(InMemoryLogService::new());

    let fallback = std::env::temp_dir().join("rust_log_shipper_demo/fallback.log");
    let mut handler = CloudWatchHandler::builder(Arc::clone(&service))
        .target(target.clone())
        .batch_size(config.batch_size())
        .flush_interval(config.flush_interval())
        .retention_days(config.retention_days)
        .fallback_path(Some(fallback.clone()))
        .retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(20)))
        .build()?;

    println!("1. Shipping records to {}:", target);
    for i in 0..5 {
        handler.emit(
            chrono::Utc::now().timestamp_millis(),
            format!("{{\"message\":\"request {}\"}}\n", i),
        );
    }
    let entry = LogEntry::new(LogLevel::Info, "user signed in").with_field("user_id", 42);
    handler.append(&entry)?;
    handler.flush();
    println!("   delivered: {}", service.events(&target).len());

    println!("\n2. Recovering from a stale sequence token:");
    service.write_as_other_writer(&target, &[LogEvent::now("written by another process")])?;
    handler.emit(chrono::Utc::now().timestamp_millis(), "after foreign write\n");
    handler.flush();
    println!("   delivered: {}", service.events(&target).len());

    println!("\n3. Spilling to the fallback file when the service is down:");
    service.fail_next_puts((0..3).map(|_| RemoteError::Throttled("Rate exceeded".into())));
    handler.emit(chrono::Utc::now().timestamp_millis(), "{\"message\":\"lost upstream\"}\n");
    handler.flush();
    println!("   fallback file: {}", fallback.display());

    println!("\n4. Final flush on shutdown:");
    handler.emit(chrono::Utc::now().timestamp_millis(), "last words\n");
    let completed = handler.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    println!(
        "   completed: {}, delivered: {}",
        completed,
        service.events(&target).len()
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
