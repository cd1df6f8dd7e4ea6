//! Stream-level encode driver.

use std::io::{self, Read};

use shardlock_rng::EntropySource;
use zeroize::Zeroize;

use crate::encode::PadEncoder;
use crate::error::CodecError;
use crate::label::CollectionLabel;

/// Default maximum plaintext bytes per chunk (2 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// A per-chunk destination. Bytes are buffered or streamed by the
/// implementation; `close` runs whatever finalisation the packaging needs
/// (wrapping, file write, archive entry append).
pub trait ChunkWriter: io::Write {
    /// Finalise this chunk's output.
    ///
    /// # Errors
    ///
    /// Returns any finalisation failure.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Factory opening one writer per `(collection, chunk)` pair.
///
/// The codec knows nothing about packaging; per-chunk files, per-collection
/// archives, and size accounting all implement this seam.
pub trait ChunkSink {
    /// Open the writer for one collection's share of one chunk.
    ///
    /// # Errors
    ///
    /// Returns any failure preparing the destination.
    fn open(
        &mut self,
        label: CollectionLabel,
        chunk: u64,
        format_tag: &str,
    ) -> io::Result<Box<dyn ChunkWriter>>;
}

/// Totals from a completed encode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Chunks emitted.
    pub chunks: u64,
    /// Plaintext bytes consumed.
    pub plaintext_bytes: u64,
}

/// Drives the pad scheme over a byte stream of arbitrary length.
///
/// Pull-driven on input: up to `chunk_size` bytes are read per chunk, the
/// chunk is encoded, each collection's frames stream into a fresh writer
/// from the sink, and the writers are closed in reverse-open order to bound
/// open-file pressure. A zero-length input produces zero chunks; only the
/// last chunk may be short.
pub struct StreamEncoder {
    chunk_size: usize,
    format_tag: String,
}

impl StreamEncoder {
    #[must_use]
    pub fn new(chunk_size: usize, format_tag: impl Into<String>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            format_tag: format_tag.into(),
        }
    }

    /// Maximum plaintext bytes per chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encode `input` to completion.
    ///
    /// # Errors
    ///
    /// Surfaces entropy, framing, and I/O failures; nothing is retried.
    pub fn encode(
        &self,
        pad: &PadEncoder,
        input: &mut dyn Read,
        rng: &dyn EntropySource,
        sink: &mut dyn ChunkSink,
    ) -> Result<EncodeSummary, CodecError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks: u64 = 0;
        let mut plaintext_bytes: u64 = 0;

        loop {
            let len = read_full(input, &mut buf)?;
            if len == 0 {
                break;
            }
            chunks += 1;

            let mut writers: Vec<Box<dyn ChunkWriter>> = Vec::with_capacity(pad.labels().len());
            for label in pad.labels() {
                writers.push(sink.open(*label, chunks, &self.format_tag)?);
            }
            pad.encode_chunk(&buf[..len], chunks, rng, &mut writers)?;
            while let Some(writer) = writers.pop() {
                writer.close()?;
            }

            plaintext_bytes += len as u64;
            buf[..len].zeroize();
            tracing::debug!(chunk = chunks, len, "encoded chunk");
        }

        buf.zeroize();
        Ok(EncodeSummary {
            chunks,
            plaintext_bytes,
        })
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
