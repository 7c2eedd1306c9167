//! Best-effort report delivery
//!
//! Each intercepted call opens a fresh blocking connection to the
//! collector socket, writes one frame, and closes. Failure is logged at
//! verbose level and otherwise ignored: interception must never stop
//! the build.

use std::collections::HashMap;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use buildtrace_common::{wire, Execution, Report};

use crate::state::{self, verbose};

/// Report one outgoing execution. `pid` is the process the execution
/// will run as: the reporter itself for `exec*` (the image is replaced
/// in place), the spawned child for `posix_spawn*`.
pub fn spawn(
    pid: u32,
    ppid: u32,
    executable: PathBuf,
    arguments: Vec<String>,
    environment: HashMap<String, String>,
) {
    let session = state::session();
    let Some(destination) = &session.destination else {
        return;
    };

    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    let report = Report::Started {
        pid,
        ppid,
        execution: Execution {
            executable,
            arguments,
            working_dir,
            environment,
        },
    };

    if let Err(err) = send(destination, &report) {
        verbose!("report not delivered: {err}");
    }
}

fn send(destination: &std::path::Path, report: &Report) -> io::Result<()> {
    let session = state::session();
    let stream = UnixStream::connect(destination)?;
    stream.set_write_timeout(Some(session.timeout))?;
    wire::write_frame(&mut &stream, report)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    Ok(())
}
