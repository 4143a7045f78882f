use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::wire::{SessionError, TERMINATOR};

/// Reads one framed request: bytes up to and including the `\x07\x08`
/// terminator, which is stripped from the returned payload.
///
/// The stream is pulled a byte at a time so a terminator straddling reads is
/// still found. Collecting `max_len` bytes without a terminator is a syntax
/// error; a lone `\x07` is ordinary payload. Each byte read races `deadline`
/// afresh, and EOF mid-frame surfaces as an I/O error.
pub(crate) async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
    deadline: Duration,
) -> Result<Vec<u8>, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::with_capacity(max_len);
    let mut byte = [0u8; 1];

    loop {
        let read = match tokio::time::timeout(deadline, reader.read(&mut byte)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!("no input for {deadline:?}");
                return Err(SessionError::TimedOut);
            }
        };
        if read == 0 {
            return Err(SessionError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            )));
        }

        frame.push(byte[0]);

        if frame.ends_with(TERMINATOR) {
            frame.truncate(frame.len() - TERMINATOR.len());
            return Ok(frame);
        }
        if frame.len() >= max_len {
            tracing::debug!("frame exceeded {max_len} bytes without a terminator");
            return Err(SessionError::Syntax);
        }
    }
}
