//! Append-only event log
//!
//! The collector writes execution records here during an intercept run;
//! citnames streams them back afterwards. Records are self-framed
//! (4-byte big-endian length + JSON payload), so the log survives a
//! collector crash with at most the trailing record lost.
//!
//! The writer holds an exclusive advisory lock for the lifetime of the
//! run; readers take a shared lock. The log is written once and read
//! once, never updated in place.

mod reader;
mod writer;

pub use reader::EventLogReader;
pub use writer::EventLogWriter;

use std::io;

use buildtrace_common::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("event log is locked by another process: {0}")]
    Locked(String),
    #[error("trailing record is truncated")]
    Truncated,
    #[error("unreadable record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<WireError> for LogError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Truncated => LogError::Truncated,
            WireError::Oversized(len) => {
                LogError::Corrupt(format!("record length {len} out of range"))
            }
            WireError::Malformed(e) => LogError::Corrupt(e.to_string()),
            WireError::Io(e) => LogError::Io(e),
        }
    }
}
