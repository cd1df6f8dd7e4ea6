//! Bounded single-producer single-consumer byte pipe.
//!
//! The two pipeline tasks share nothing but this pipe. Writes block when the
//! queue is full; reads block when it is empty. Dropping the writer ends the
//! stream cleanly (readers observe EOF); [`PipeWriter::close_with_error`]
//! ends it with a fault the reader surfaces as an I/O error. Dropping the
//! reader makes subsequent writes fail, which is how cancellation reaches
//! the producer.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

/// Default bound on in-flight blocks.
pub const DEFAULT_CAPACITY: usize = 16;

type Fault = Arc<Mutex<Option<String>>>;

/// Create a pipe bounded to `capacity` in-flight blocks.
#[must_use]
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = bounded(capacity.max(1));
    let fault: Fault = Arc::new(Mutex::new(None));
    (
        PipeWriter {
            sender: Some(sender),
            fault: Arc::clone(&fault),
        },
        PipeReader {
            receiver,
            fault,
            current: Vec::new(),
            position: 0,
        },
    )
}

/// Producer half.
pub struct PipeWriter {
    sender: Option<Sender<Vec<u8>>>,
    fault: Fault,
}

impl PipeWriter {
    /// Close the pipe carrying an error; the reader's next read fails with
    /// `reason`.
    pub fn close_with_error(mut self, reason: String) {
        *self.fault.lock() = Some(reason);
        self.sender = None;
    }

    fn closed_error(&self) -> io::Error {
        let fault = self.fault.lock();
        match fault.as_ref() {
            Some(reason) => io::Error::new(io::ErrorKind::BrokenPipe, reason.clone()),
            None => io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        }
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| self.closed_error())?;
        sender
            .send(buf.to_vec())
            .map_err(|_| self.closed_error())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Consumer half.
pub struct PipeReader {
    receiver: Receiver<Vec<u8>>,
    fault: Fault,
    current: Vec<u8>,
    position: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.position < self.current.len() {
                let n = buf.len().min(self.current.len() - self.position);
                buf[..n].copy_from_slice(&self.current[self.position..self.position + n]);
                self.position += n;
                return Ok(n);
            }
            match self.receiver.recv() {
                Ok(block) => {
                    self.current = block;
                    self.position = 0;
                }
                Err(_) => {
                    let fault = self.fault.lock();
                    return match fault.as_ref() {
                        Some(reason) => {
                            Err(io::Error::new(io::ErrorKind::Other, reason.clone()))
                        }
                        None => Ok(0),
                    };
                }
            }
        }
    }
}
