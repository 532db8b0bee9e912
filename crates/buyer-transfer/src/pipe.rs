//! A byte pipe from a blocking producer thread into a streamed
//! `reqwest::Body`: some HTTP clients buffer the request fully before
//! sending, which would defeat pipelined chunk push (the seller is meant to
//! start reading our upload while we're still encoding it). Writing into a
//! bounded channel and wrapping the receiving half as a body stream keeps
//! producer and the HTTP write truly concurrent.

use std::io;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The write end of a [`byte_pipe`]. Implements [`std::io::Write`] so a
/// `spawn_blocking` producer can drive it with ordinary synchronous encoders
/// (multipart framing, a [`flate2::write::GzEncoder`], …).
pub struct PipeWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl PipeWriter {
    /// A clone of the underlying sender, kept so a caller can still close
    /// the pipe with an error after `self` has been moved into another
    /// `Write` adapter (e.g. a gzip encoder) that owns it by value.
    pub fn error_sender(&self) -> mpsc::Sender<io::Result<Bytes>> {
        self.tx.clone()
    }
}

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body receiver dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Build a connected producer/consumer pair: bytes written to the returned
/// [`PipeWriter`] arrive as frames of the returned [`reqwest::Body`].
pub fn byte_pipe(capacity: usize) -> (PipeWriter, reqwest::Body) {
    let (tx, rx) = mpsc::channel(capacity);
    let body = reqwest::Body::wrap_stream(ReceiverStream::new(rx));
    (PipeWriter { tx }, body)
}

/// Close the pipe's write end with a propagating error. Every producer exit
/// path, including error, must close the write end; a silently dropped
/// sender would surface to the reader as a truncated body rather than the
/// real cause.
pub fn close_with_error(tx: &mpsc::Sender<io::Result<Bytes>>, err: io::Error) {
    let _ = tx.blocking_send(Err(err));
}
