//! Length-prefixed record framing
//!
//! Both the report wire (reporter to collector) and the on-disk event
//! log use the same frame: a 4-byte big-endian payload length followed
//! by a JSON document. Readers distinguish a clean end-of-stream from a
//! frame cut short mid-write, so a crashed run loses at most its
//! trailing record.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Upper bound on a single frame; a longer length prefix means the
/// stream is corrupt, not that someone compiled a 64MB command line.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("stream ended inside a frame")]
    Truncated,
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(u32),
    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Serialize `value` and write it as one frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), WireError> {
    let payload = serde_json::to_vec(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| WireError::Oversized(u32::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(WireError::Oversized(len));
    }
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Read the next frame, or `None` at a clean end of stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>, WireError> {
    let mut prefix = [0u8; 4];
    match read_exact_or_eof(reader, &mut prefix)? {
        Filled::Eof => return Ok(None),
        Filled::Partial => return Err(WireError::Truncated),
        Filled::Complete => {}
    }

    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_LEN {
        return Err(WireError::Oversized(len));
    }

    let mut payload = vec![0u8; len as usize];
    match read_exact_or_eof(reader, &mut payload)? {
        Filled::Complete => {}
        Filled::Eof | Filled::Partial => return Err(WireError::Truncated),
    }

    Ok(Some(serde_json::from_slice(&payload)?))
}

enum Filled {
    Complete,
    Partial,
    Eof,
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<Filled> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) if read == 0 => return Ok(Filled::Eof),
            Ok(0) => return Ok(Filled::Partial),
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Filled::Complete)
}
