use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use buildtrace_common::{wire, Event, EventRecord};
use chrono::Utc;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::LogError;

/// Serialized appender for the event log.
///
/// One writer exists per run, owned by the collector's writer task; the
/// exclusive lock turns a concurrent second intercept run against the
/// same path into an early error instead of an interleaved log.
pub struct EventLogWriter {
    lock: Flock<File>,
    path: PathBuf,
    records: u64,
}

impl EventLogWriter {
    /// Create (or truncate) the log at `path` and take the run lock.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| LogError::Locked(format!("{}: {errno}", path.display())))?;
        // truncate only once the lock is held; a concurrent run's log
        // must not be clobbered by a failed create
        lock.set_len(0)?;

        debug!(path = %path.display(), "event log created");
        Ok(Self {
            lock,
            path,
            records: 0,
        })
    }

    /// Append one event under a fresh receipt timestamp.
    pub fn append(&mut self, rid: u64, event: Event) -> Result<(), LogError> {
        let record = EventRecord {
            rid,
            timestamp: Utc::now(),
            event,
        };
        self.append_record(&record)
    }

    /// Append a fully formed record.
    pub fn append_record(&mut self, record: &EventRecord) -> Result<(), LogError> {
        let mut file: &File = &self.lock;
        wire::write_frame(&mut file, record)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force written records to disk. The lock is released on drop.
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.lock.sync_all()?;
        Ok(())
    }
}
