use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use buildtrace_common::{wire, EventRecord};
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::LogError;

/// Streaming reader over an event log.
///
/// Yields records in receipt order, which is not causal order: a child's
/// start record may precede its parent's. Unknown payload fields are
/// ignored for forward compatibility. A truncated trailing record ends
/// the stream with [`LogError::Truncated`] after every complete record
/// has been yielded; anything else unreadable is [`LogError::Corrupt`].
pub struct EventLogReader {
    reader: BufReader<SharedLock>,
    path: PathBuf,
    done: bool,
}

/// Holds the shared lock for as long as the reader lives.
struct SharedLock(Flock<File>);

impl Read for SharedLock {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl EventLogReader {
    /// Open the log at `path` under a shared lock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let lock = Flock::lock(file, FlockArg::LockSharedNonblock)
            .map_err(|(_, errno)| LogError::Locked(format!("{}: {errno}", path.display())))?;

        debug!(path = %path.display(), "event log opened");
        Ok(Self {
            reader: BufReader::new(SharedLock(lock)),
            path,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for EventLogReader {
    type Item = Result<EventRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match wire::read_frame::<_, EventRecord>(&mut self.reader) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventLogWriter;
    use buildtrace_common::{Event, Execution};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn started(pid: u32, parent_rid: u64) -> Event {
        Event::Started {
            parent_rid,
            pid,
            execution: Execution {
                executable: "/usr/bin/cc".into(),
                arguments: vec!["cc".into(), "-c".into(), "a.c".into()],
                working_dir: "/proj".into(),
                environment: HashMap::new(),
            },
        }
    }

    fn write_log(path: &Path) {
        let mut writer = EventLogWriter::create(path).unwrap();
        writer.append(1, started(10, 0)).unwrap();
        writer.append(2, started(11, 1)).unwrap();
        writer.append(2, Event::Terminated { status: 0 }).unwrap();
        writer.append(1, Event::Terminated { status: 0 }).unwrap();
        writer.flush().unwrap();
    }

    #[test]
    fn reads_records_in_receipt_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.db");
        write_log(&path);

        let records: Vec<_> = EventLogReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].rid, 1);
        assert_eq!(records[1].rid, 2);
        assert!(matches!(records[3].event, Event::Terminated { status: 0 }));
    }

    #[test]
    fn truncated_tail_yields_prefix_then_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.db");
        write_log(&path);

        // chop into the last record, as a crashed collector would
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let mut complete = 0;
        let mut tail_error = None;
        for item in EventLogReader::open(&path).unwrap() {
            match item {
                Ok(_) => complete += 1,
                Err(e) => tail_error = Some(e),
            }
        }
        assert_eq!(complete, 3);
        assert!(matches!(tail_error, Some(LogError::Truncated)));
    }

    #[test]
    fn corrupt_payload_is_not_reported_as_truncation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.db");
        {
            let mut file = File::create(&path).unwrap();
            let garbage = b"not json";
            file.write_all(&(garbage.len() as u32).to_be_bytes())
                .unwrap();
            file.write_all(garbage).unwrap();
        }

        let mut reader = EventLogReader::open(&path).unwrap();
        assert!(matches!(reader.next(), Some(Err(LogError::Corrupt(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn empty_log_is_a_clean_end() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.db");
        File::create(&path).unwrap();

        let mut reader = EventLogReader::open(&path).unwrap();
        assert!(reader.next().is_none());
    }
}
