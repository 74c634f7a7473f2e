//! Local fallback for batches the remote stream would not take
//!
//! Each event is written as `[<local ISO-8601 time>] <message>`. No newline
//! is added: messages from the structured formatter already end with one,
//! and the record is written exactly as received.

use crate::core::{Batch, Result, ShipperError, TimestampFormat};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::error;

/// How long a spill waits for another writer to release the fallback file
#[cfg(feature = "file-lock")]
const LOCK_WAIT: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, Clone, Default)]
pub struct FallbackSpiller {
    path: Option<PathBuf>,
}

impl FallbackSpiller {
    /// `None` or an empty path disables the fallback
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append the batch to the fallback file.
    ///
    /// Never fails the caller. Without a configured path the batch is
    /// dropped; write failures are logged and the batch is lost.
    pub fn spill(&self, batch: &Batch) {
        let Some(path) = self.path.as_deref() else {
            error!(events = batch.len(), "no fallback path configured, dropping batch");
            return;
        };

        if let Err(e) = Self::write_batch(path, batch) {
            error!(path = %path.display(), events = batch.len(), error = %e, "fallback write failed, batch lost");
        }
    }

    fn write_batch(path: &Path, batch: &Batch) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ShipperError::io_operation(
                    "creating fallback directory",
                    format!("cannot create '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ShipperError::io_operation(
                    "opening fallback file",
                    format!("cannot open '{}'", path.display()),
                    e,
                )
            })?;

        let locked = Self::lock_bounded(&file, path);

        let mut writer = BufWriter::new(&file);
        let format = TimestampFormat::LocalSeconds;
        for event in batch.iter() {
            write!(
                writer,
                "[{}] {}",
                format.format_millis(event.timestamp_millis()),
                event.message()
            )?;
        }
        writer.flush()?;
        drop(writer);

        if locked {
            #[cfg(feature = "file-lock")]
            fs2::FileExt::unlock(&file)?;
        }

        Ok(())
    }

    /// Take the advisory lock, giving up after [`LOCK_WAIT`]. On contention
    /// the batch is still written, unlocked, rather than stalling the flush.
    #[cfg(feature = "file-lock")]
    fn lock_bounded(file: &File, path: &Path) -> bool {
        let deadline = std::time::Instant::now() + LOCK_WAIT;
        loop {
            match fs2::FileExt::try_lock_exclusive(file) {
                Ok(()) => return true,
                Err(_) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "fallback file stays locked, writing without lock");
                    return false;
                }
            }
        }
    }

    #[cfg(not(feature = "file-lock"))]
    fn lock_bounded(_file: &File, _path: &Path) -> bool {
        false
    }
}
