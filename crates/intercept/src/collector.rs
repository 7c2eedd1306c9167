//! Report collection endpoint
//!
//! One task per accepted connection decodes frames and feeds a
//! single-consumer channel; the writer task owns the event log, assigns
//! record ids, and resolves parent ids through the pid map. The log is
//! written in receipt order, not causal order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use buildtrace_common::{wire, Event, Report};
use buildtrace_eventlog::{EventLogWriter, LogError};
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read side of one reporter connection is bounded; a client that
/// connects and goes silent must not stall the final drain.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Input to the writer task.
///
/// `Root` registers the supervised command itself. A freshly spawned
/// build can exec children before the supervisor's own registration
/// reaches the writer task, so the writer holds every report received
/// ahead of `Root` and replays it afterwards; without that, a fast
/// descendant would be misfiled as a top-level process.
pub enum Message {
    Root(Report),
    Report(Report),
}

pub struct Collector {
    locator: PathBuf,
    tx: mpsc::Sender<Message>,
    accept_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<u64, LogError>>,
}

impl Collector {
    /// Bind the session socket and start collecting into `log_path`.
    pub fn bind(locator: &Path, log_path: &Path) -> Result<Self> {
        let writer = EventLogWriter::create(log_path)
            .with_context(|| format!("Failed to create event log {}", log_path.display()))?;

        let listener = UnixListener::bind(locator)
            .with_context(|| format!("Failed to bind session socket {}", locator.display()))?;

        let (tx, rx) = mpsc::channel::<Message>(256);
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let accept_task = tokio::spawn(accept_loop(listener, tx.clone()));

        debug!(locator = %locator.display(), "collector listening");
        Ok(Self {
            locator: locator.to_path_buf(),
            tx,
            accept_task,
            writer_task,
        })
    }

    /// Sender the supervisor uses to record the root command's events.
    pub fn reporter(&self) -> mpsc::Sender<Message> {
        self.tx.clone()
    }

    /// Stop accepting, drain in-flight reports, flush, close.
    ///
    /// Returns the number of records written. Reporters still mid-frame
    /// get `drain_timeout` to finish before the run gives up on them.
    pub async fn shutdown(self, drain_timeout: Duration) -> Result<u64> {
        self.accept_task.abort();
        let _ = self.accept_task.await;
        drop(self.tx);

        match tokio::time::timeout(drain_timeout, self.writer_task).await {
            Ok(joined) => {
                let records = joined.context("collector writer task failed")??;
                let _ = std::fs::remove_file(&self.locator);
                Ok(records)
            }
            Err(_) => {
                warn!("drain timeout expired with reports still in flight");
                let _ = std::fs::remove_file(&self.locator);
                Ok(0)
            }
        }
    }
}

async fn accept_loop(listener: UnixListener, tx: mpsc::Sender<Message>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        tokio::time::timeout(CONNECTION_TIMEOUT, serve_connection(stream, tx))
                            .await
                    {
                        warn!("reporter connection timed out: {err}");
                    }
                });
            }
            Err(err) => {
                // one bad accept must not tear down the session
                warn!("accept failed: {err}");
            }
        }
    }
}

/// Read every frame a reporter sends on one connection. A malformed
/// frame drops the rest of the connection with a warning; the run
/// continues.
async fn serve_connection(mut stream: UnixStream, tx: mpsc::Sender<Message>) {
    loop {
        match read_report(&mut stream).await {
            Ok(Some(report)) => {
                if tx.send(Message::Report(report)).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                warn!("malformed report dropped: {err}");
                return;
            }
        }
    }
}

async fn read_report(stream: &mut UnixStream) -> Result<Option<Report>> {
    let mut prefix = [0u8; 4];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(prefix);
    if len > wire::MAX_FRAME_LEN {
        anyhow::bail!("frame length {len} out of range");
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Single consumer of the report channel; the only writer of the log.
async fn write_loop(
    mut writer: EventLogWriter,
    mut rx: mpsc::Receiver<Message>,
) -> Result<u64, LogError> {
    // pid of the last started execution -> its record id; children
    // resolve their parent through it
    let mut pids: HashMap<u32, u64> = HashMap::new();
    let mut next_rid: u64 = 1;
    let mut root_seen = false;
    // reports that raced ahead of the root registration, in receipt order
    let mut held: Vec<Report> = Vec::new();

    while let Some(message) = rx.recv().await {
        match message {
            Message::Root(report) => {
                root_seen = true;
                apply(&mut writer, &mut pids, &mut next_rid, report)?;
                for report in held.drain(..) {
                    apply(&mut writer, &mut pids, &mut next_rid, report)?;
                }
            }
            Message::Report(report) if !root_seen => held.push(report),
            Message::Report(report) => {
                apply(&mut writer, &mut pids, &mut next_rid, report)?;
            }
        }
    }

    // a run whose root never registered (the spawn itself failed) still
    // keeps whatever arrived
    for report in held {
        apply(&mut writer, &mut pids, &mut next_rid, report)?;
    }

    writer.flush()?;
    debug!(records = writer.records(), "event log closed");
    Ok(writer.records())
}

fn apply(
    writer: &mut EventLogWriter,
    pids: &mut HashMap<u32, u64>,
    next_rid: &mut u64,
    report: Report,
) -> Result<(), LogError> {
    match report {
        Report::Started {
            pid,
            ppid,
            execution,
        } => {
            let rid = *next_rid;
            *next_rid += 1;
            let parent_rid = pids.get(&ppid).copied().unwrap_or(0);
            pids.insert(pid, rid);
            writer.append(
                rid,
                Event::Started {
                    parent_rid,
                    pid,
                    execution,
                },
            )?;
        }
        Report::Terminated { pid, status } => match pids.get(&pid) {
            Some(&rid) => writer.append(rid, Event::Terminated { status })?,
            None => warn!(pid, "exit report for an unknown process dropped"),
        },
        Report::Signalled { pid, signal } => match pids.get(&pid) {
            Some(&rid) => writer.append(rid, Event::Signalled { signal })?,
            None => warn!(pid, "signal report for an unknown process dropped"),
        },
    }
    Ok(())
}
