//! Blocking in-memory pipe between two threads.
//!
//! The pipe carries byte chunks over a bounded crossbeam channel. A writer
//! blocks once `capacity` chunks are queued and unread, which is the only
//! backpressure mechanism the producer/consumer pairing needs.

use std::io::{ErrorKind, Read, Write};

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::trace;

/// Default number of in-flight chunks.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Largest chunk a single `write` call hands to the reader.
pub const MAX_PIPE_CHUNK: usize = 64 * 1024;

/// Create a connected writer/reader pair holding at most `capacity` chunks.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = bounded(capacity);
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            current: Vec::new(),
            pos: 0,
        },
    )
}

/// Producer end. Dropping it signals end-of-stream to the reader.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(MAX_PIPE_CHUNK);
        self.tx.send(buf[..n].to_vec()).map_err(|_| {
            std::io::Error::new(ErrorKind::BrokenPipe, "pipe reader has been dropped")
        })?;
        trace!(bytes = n, "pipe chunk queued");
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Consumer end. Reads return 0 once every writer is dropped and the queue
/// is drained.
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    current: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.current.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = (self.current.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
