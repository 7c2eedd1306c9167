//! Report delivery to the collector socket

use std::io;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use buildtrace_common::{wire, Report};

const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Send one report; best effort, the caller decides whether to mention
/// a failure.
pub fn send(destination: &Path, report: &Report) -> io::Result<()> {
    let stream = UnixStream::connect(destination)?;
    stream.set_write_timeout(Some(SEND_TIMEOUT))?;
    wire::write_frame(&mut &stream, report)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
}
