//! Dry-run size accounting.
//!
//! A dry run exercises the full pipeline with counting stand-ins for every
//! real writer, so the reported numbers come from the same code path as a
//! real encode. PNG and tar overheads are computed exactly from the wrapper
//! layouts.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use shardlock_io::Format;
use shardlock_pad::{ChunkSink, ChunkWriter, CollectionLabel};

/// Sizes measured by a dry run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SizeReport {
    /// Serialised (tar) input bytes.
    pub input_bytes: u64,
    /// Bytes after compression, as fed to the codec.
    pub compressed_bytes: u64,
    /// Per-collection output bytes, sorted by label.
    pub collection_bytes: Vec<(String, u64)>,
    /// Sum over all collections.
    pub total_collection_bytes: u64,
}

impl SizeReport {
    /// Output bytes of a single collection (they are all the same size).
    #[must_use]
    pub fn each_collection_bytes(&self) -> u64 {
        if self.collection_bytes.is_empty() {
            0
        } else {
            self.total_collection_bytes / self.collection_bytes.len() as u64
        }
    }

    /// Compressed over raw input, as a percentage.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            self.compressed_bytes as f64 / self.input_bytes as f64 * 100.0
        }
    }

    /// Total output over raw input, as a percentage.
    #[must_use]
    pub fn expansion_ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            self.total_collection_bytes as f64 / self.input_bytes as f64 * 100.0
        }
    }
}

/// Tar entry size: 512-byte header plus content padded to 512.
const TAR_BLOCK: u64 = 512;
/// Tar end-of-archive trailer: two zero blocks.
const TAR_TRAILER: u64 = 1024;

fn tar_entry_size(content_len: u64) -> u64 {
    TAR_BLOCK + content_len.div_ceil(TAR_BLOCK) * TAR_BLOCK
}

type Totals = Arc<Mutex<BTreeMap<String, u64>>>;

/// Chunk sink that accounts sizes without touching the filesystem.
///
/// Clones share the same totals, so a clone kept aside reads the results
/// after the sink itself has been consumed by the encode run.
#[derive(Clone)]
pub(crate) struct SizeSink {
    format: Format,
    archive: bool,
    totals: Totals,
}

impl SizeSink {
    pub(crate) fn new(format: Format, archive: bool) -> Self {
        Self {
            format,
            archive,
            totals: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Per-collection totals, with the archive trailer added in tar mode.
    pub(crate) fn collection_totals(&self) -> Vec<(String, u64)> {
        self.totals
            .lock()
            .iter()
            .map(|(label, &bytes)| {
                let total = if self.archive { bytes + TAR_TRAILER } else { bytes };
                (label.clone(), total)
            })
            .collect()
    }
}

struct SizeChunkWriter {
    label: String,
    len: u64,
    format: Format,
    archive: bool,
    totals: Totals,
}

impl Write for SizeChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ChunkWriter for SizeChunkWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let wrapped = self.format.wrapped_len(self.len as usize) as u64;
        let stored = if self.archive {
            tar_entry_size(wrapped)
        } else {
            wrapped
        };
        *self.totals.lock().entry(self.label).or_insert(0) += stored;
        Ok(())
    }
}

impl ChunkSink for SizeSink {
    fn open(
        &mut self,
        label: CollectionLabel,
        _chunk: u64,
        _format_tag: &str,
    ) -> io::Result<Box<dyn ChunkWriter>> {
        Ok(Box::new(SizeChunkWriter {
            label: label.to_string(),
            len: 0,
            format: self.format,
            archive: self.archive,
            totals: Arc::clone(&self.totals),
        }))
    }
}

/// Writer wrapper feeding a shared byte counter.
pub(crate) struct CountingWriter<W> {
    inner: W,
    counter: Arc<AtomicU64>,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader wrapper feeding a shared byte counter.
pub(crate) struct CountingReader<R> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tar_entry_sizes_round_to_blocks() {
        assert_eq!(tar_entry_size(0), 512);
        assert_eq!(tar_entry_size(1), 1024);
        assert_eq!(tar_entry_size(512), 1024);
        assert_eq!(tar_entry_size(513), 1536);
    }

    #[test]
    fn size_sink_accumulates_per_collection() {
        let mut sink = SizeSink::new(Format::Bin, false);
        let label: CollectionLabel = "2A3".parse().unwrap();
        for _ in 0..3 {
            let mut writer = sink.open(label, 1, "bin").unwrap();
            writer.write_all(&[0u8; 100]).unwrap();
            writer.close().unwrap();
        }
        let totals = sink.collection_totals();
        assert_eq!(totals, vec![("2A3".to_string(), 300)]);
    }

    #[test]
    fn size_sink_archive_mode_adds_tar_overhead() {
        let mut sink = SizeSink::new(Format::Bin, true);
        let label: CollectionLabel = "2A3".parse().unwrap();
        let mut writer = sink.open(label, 1, "bin").unwrap();
        writer.write_all(&[0u8; 100]).unwrap();
        writer.close().unwrap();
        let totals = sink.collection_totals();
        // 512 header + 512 padded content + 1024 trailer.
        assert_eq!(totals, vec![("2A3".to_string(), 512 + 512 + 1024)]);
    }

    #[test]
    fn counters_count() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut writer = CountingWriter::new(Vec::new(), Arc::clone(&counter));
        writer.write_all(&[0u8; 42]).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 42);

        let counter = Arc::new(AtomicU64::new(0));
        let mut reader = CountingReader::new(&[0u8; 17][..], Arc::clone(&counter));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 17);
    }

    #[test]
    fn report_ratios() {
        let report = SizeReport {
            input_bytes: 1000,
            compressed_bytes: 400,
            collection_bytes: vec![("2A3".to_string(), 900), ("2B3".to_string(), 900)],
            total_collection_bytes: 1800,
        };
        assert_eq!(report.each_collection_bytes(), 900);
        assert!((report.compression_ratio() - 40.0).abs() < f64::EPSILON);
        assert!((report.expansion_ratio() - 180.0).abs() < f64::EPSILON);
    }
}
