//! Event logger - persists the activity stream to a JSONL file

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, WatchEvent};

/// Writes bus events to `<dir>/events.jsonl`
pub struct EventLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLogger {
    /// Create a logger writing under the given directory
    pub fn new(dir: impl AsRef<Path>) -> eyre::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join("events.jsonl");
        debug!(path = %path.display(), "EventLogger::new: opening log");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Append one event as a JSON line
    pub fn write_event(&mut self, event: &WatchEvent) -> eyre::Result<()> {
        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Run the logger, consuming events from the bus until it closes
    ///
    /// This is meant to be spawned as a background task.
    pub async fn run(mut self, bus: Arc<EventBus>) {
        debug!(path = %self.path.display(), "EventLogger::run: starting");
        let mut rx = bus.subscribe();

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "EventLogger: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        let _ = self.writer.flush();
    }
}

/// Read logged events back from a directory
pub fn read_events(dir: impl AsRef<Path>) -> eyre::Result<Vec<EventLogEntry>> {
    let path = dir.as_ref().join("events.jsonl");
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_events: failed to parse line");
            }
        }
    }
    Ok(entries)
}

/// Spawn the event logger as a background task
pub fn spawn_event_logger(bus: Arc<EventBus>, dir: impl AsRef<Path>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::new(dir)?;
    Ok(tokio::spawn(async move {
        logger.run(bus).await;
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_back() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path()).unwrap();

        logger
            .write_event(&WatchEvent::ProcessingStarted {
                target: "http://a".to_string(),
                group: "widgets".to_string(),
                region: "us-east-1".to_string(),
            })
            .unwrap();
        logger
            .write_event(&WatchEvent::ProcessingCleared {
                target: "http://a".to_string(),
            })
            .unwrap();

        let entries = read_events(temp.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "ProcessingStarted");
        assert_eq!(entries[1].event.event_type(), "ProcessingCleared");
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let temp = tempdir().unwrap();
        assert!(read_events(temp.path()).unwrap().is_empty());
    }
}
