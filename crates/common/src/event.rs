//! Execution reports and event log records

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One spawned process as observed at the exec boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Absolute path of the image that will run (PATH search already
    /// replayed for `exec*p` variants).
    pub executable: PathBuf,
    /// Argument vector verbatim, including argv[0] as the caller supplied it.
    pub arguments: Vec<String>,
    /// Working directory at the time of the call, absolute.
    pub working_dir: PathBuf,
    /// Environment of the new image.
    pub environment: HashMap<String, String>,
}

/// What a reporter sends to the collector. Pids are the reporter's own
/// view; the collector maps them to run-local record ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Report {
    Started {
        pid: u32,
        ppid: u32,
        execution: Execution,
    },
    Terminated {
        pid: u32,
        status: i32,
    },
    Signalled {
        pid: u32,
        signal: i32,
    },
}

impl Report {
    pub fn pid(&self) -> u32 {
        match self {
            Report::Started { pid, .. }
            | Report::Terminated { pid, .. }
            | Report::Signalled { pid, .. } => *pid,
        }
    }
}

/// The per-execution payload of an event log record.
///
/// A `Started` event opens a record id; `Terminated`/`Signalled` close
/// it. Preload-mode reporters replace their own image on exec, so their
/// records may never see a closing event; consumers treat termination as
/// optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Started {
        /// Record id of the closest intercepted ancestor, 0 for the root.
        parent_rid: u64,
        pid: u32,
        execution: Execution,
    },
    Terminated {
        status: i32,
    },
    Signalled {
        signal: i32,
    },
}

/// One self-describing record of the event log.
///
/// `rid` identifies the execution, not the record: the start and stop
/// records of one execution share it. Ids are dense and monotonic in the
/// order start records were received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub rid: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventRecord {
    /// The execution carried by a start record, if this is one.
    pub fn execution(&self) -> Option<&Execution> {
        match &self.event {
            Event::Started { execution, .. } => Some(execution),
            _ => None,
        }
    }
}
