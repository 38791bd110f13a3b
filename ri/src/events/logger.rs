//! Event Logger - persists events to an NDJSON file
//!
//! The EventLogger subscribes to the EventBus and appends every event to a
//! single log file, one flat JSON record per line, for later rendering.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Context;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::bus::{EventBus, Listener};
use super::types::EventLogEntry;

/// Default log file name, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "rxinspect.ndjson";

/// Event logger that appends events to an NDJSON file
pub struct EventLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl EventLogger {
    /// Create a new event logger; the file is opened lazily on first write
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogger::new: creating logger");
        Self {
            path,
            writer: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written since creation
    pub fn written(&self) -> u64 {
        self.written
    }

    fn open(&self) -> eyre::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(format!("Failed to open event log {}", self.path.display()))?;
        debug!(path = ?self.path, "EventLogger: opened log file");
        Ok(BufWriter::new(file))
    }

    /// Append one event as a JSON line
    pub fn write_event(&mut self, entry: &EventLogEntry) -> eyre::Result<()> {
        debug!(event_type = entry.event.event_type(), "EventLogger::write_event");

        if self.writer.is_none() {
            self.writer = Some(self.open()?);
        }

        let json = serde_json::to_string(entry)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", json)?;
            writer.flush()?;
            self.written += 1;
        }

        Ok(())
    }

    /// Release the file handle so an external rotator can move or truncate the
    /// file; the next write reopens the path
    pub fn reopen(&mut self) {
        debug!(path = ?self.path, "EventLogger::reopen");
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }

    /// Run the logger, consuming events from a listener until it closes
    ///
    /// Each `rotate` notification releases the file handle before the next
    /// write. The first write failure ends the task and is returned; on a
    /// clean shutdown the number of records written is returned.
    pub async fn run(mut self, mut listener: Listener, rotate: Arc<Notify>) -> eyre::Result<u64> {
        debug!("EventLogger::run: starting event logger");

        loop {
            tokio::select! {
                biased;
                _ = rotate.notified() => self.reopen(),
                entry = listener.recv() => {
                    let Some(entry) = entry else { break };
                    if let Err(e) = self.write_event(&entry) {
                        error!(path = ?self.path, error = %e, "EventLogger: failed to write event");
                        return Err(e);
                    }
                }
            }
        }

        debug!(written = self.written, "EventLogger: listener closed, shutting down");
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("Failed to flush event log")?;
        }
        Ok(self.written)
    }
}

/// Handle to a spawned event logger task
pub struct EventLoggerHandle {
    rotate: Arc<Notify>,
    task: JoinHandle<eyre::Result<u64>>,
}

impl EventLoggerHandle {
    /// Ask the logger to release its file before the next write
    pub fn rotate(&self) {
        debug!("EventLoggerHandle::rotate: called");
        self.rotate.notify_one();
    }

    /// Wait for the logger to drain and stop; yields the record count
    ///
    /// The logger stops once every handle on its bus is gone.
    pub async fn finish(self) -> eyre::Result<u64> {
        self.task.await.context("Event logger task failed")?
    }
}

/// Spawn the event logger as a background task
pub fn spawn_event_logger(bus: &EventBus, path: impl AsRef<Path>) -> EventLoggerHandle {
    let logger = EventLogger::new(path);
    let listener = bus.subscribe();
    let rotate = Arc::new(Notify::new());
    let task = tokio::spawn(logger.run(listener, rotate.clone()));
    EventLoggerHandle { rotate, task }
}
