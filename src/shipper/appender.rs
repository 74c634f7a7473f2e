//! `Appender` integration
//!
//! Lets a [`CloudWatchHandler`] sit behind any code that hands out
//! [`LogEntry`] values. Each entry becomes one newline-terminated JSON
//! object and is emitted like any other record.

use super::handler::CloudWatchHandler;
use crate::core::{Appender, LogEntry, LogLevel, Result};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct RenderedEntry<'a> {
    ts: String,
    level: LogLevel,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "no_context")]
    context: &'a BTreeMap<String, serde_json::Value>,
}

fn no_context(context: &&BTreeMap<String, serde_json::Value>) -> bool {
    context.is_empty()
}

impl CloudWatchHandler {
    /// Render an entry the way it is shipped
    pub fn render(&self, entry: &LogEntry) -> Result<String> {
        let rendered = RenderedEntry {
            ts: self.timestamp_format.format(&entry.timestamp),
            level: entry.level,
            message: &entry.message,
            channel: entry.channel.as_deref(),
            context: &entry.context,
        };

        let mut json = serde_json::to_string(&rendered)?;
        json.push('\n');
        Ok(json)
    }
}

impl Appender for CloudWatchHandler {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let message = self.render(entry)?;
        self.emit(entry.timestamp.timestamp_millis(), message);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        CloudWatchHandler::flush(self);
        Ok(())
    }

    fn name(&self) -> &str {
        "cloudwatch"
    }
}
