//! Chunk writer factories: per-chunk files and per-collection archives.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shardlock_pad::{ChunkSink, ChunkWriter, CollectionLabel};

use crate::format::Format;

/// Open tar outputs, one per collection, held across chunks.
///
/// Owned by the encode call that creates it; nothing is global. Entry
/// appends are serialised by a single lock keyed map, and `finalize_all`
/// drains every writer, finishing the archives.
#[derive(Default)]
pub struct ArchiveRegistry {
    writers: Mutex<HashMap<PathBuf, tar::Builder<File>>>,
}

impl ArchiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk entry to the archive at `tar_path`, creating the
    /// archive (and its parent directory) on first use.
    ///
    /// # Errors
    ///
    /// Returns any archive creation or write failure.
    pub fn append_chunk(
        &self,
        tar_path: &Path,
        entry_name: &str,
        bytes: &[u8],
    ) -> io::Result<()> {
        let mut writers = self.writers.lock();
        if !writers.contains_key(tar_path) {
            if let Some(parent) = tar_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = File::create(tar_path)?;
            writers.insert(tar_path.to_path_buf(), tar::Builder::new(file));
            tracing::debug!(path = %tar_path.display(), "opened collection archive");
        }
        let builder = writers
            .get_mut(tar_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "archive writer vanished"))?;

        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        );
        builder.append_data(&mut header, entry_name, bytes)?;
        tracing::debug!(path = %tar_path.display(), entry = entry_name, len = bytes.len(), "appended chunk entry");
        Ok(())
    }

    /// Finish and close every open archive.
    ///
    /// # Errors
    ///
    /// Returns the last failure encountered; all writers are drained
    /// regardless.
    pub fn finalize_all(&self) -> io::Result<()> {
        let mut writers = self.writers.lock();
        let mut last_error = None;
        for (path, builder) in writers.drain() {
            match builder.into_inner().and_then(|file| file.sync_all()) {
                Ok(()) => tracing::debug!(path = %path.display(), "finalized collection archive"),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "archive finalize failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of archives currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.writers.lock().len()
    }
}

/// Buffers one chunk's frames, then hands the wrapped bytes to `commit`.
struct BufferedChunkWriter<F: FnOnce(Vec<u8>) -> io::Result<()>> {
    buf: Vec<u8>,
    format: Format,
    commit: Option<F>,
}

impl<F: FnOnce(Vec<u8>) -> io::Result<()>> Write for BufferedChunkWriter<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F: FnOnce(Vec<u8>) -> io::Result<()>> ChunkWriter for BufferedChunkWriter<F> {
    fn close(mut self: Box<Self>) -> io::Result<()> {
        let wrapped = self.format.wrap(&self.buf);
        let commit = self
            .commit
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "chunk writer closed twice"))?;
        commit(wrapped)
    }
}

/// Writer factory for files-mode output: one file per chunk per collection,
/// under each collection's directory.
pub struct FileChunkSink {
    directories: HashMap<CollectionLabel, PathBuf>,
    format: Format,
}

impl FileChunkSink {
    /// `directories` maps each collection label to its output directory.
    #[must_use]
    pub fn new(directories: HashMap<CollectionLabel, PathBuf>, format: Format) -> Self {
        Self {
            directories,
            format,
        }
    }
}

impl ChunkSink for FileChunkSink {
    fn open(
        &mut self,
        label: CollectionLabel,
        chunk: u64,
        _format_tag: &str,
    ) -> io::Result<Box<dyn ChunkWriter>> {
        let dir = self.directories.get(&label).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no output directory for collection {label}"),
            )
        })?;
        let path = dir.join(self.format.chunk_file_name(label, chunk));
        let format = self.format;
        Ok(Box::new(BufferedChunkWriter {
            buf: Vec::new(),
            format,
            commit: Some(move |wrapped: Vec<u8>| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, wrapped)?;
                tracing::debug!(path = %path.display(), "wrote chunk file");
                Ok(())
            }),
        }))
    }
}

/// Writer factory for archive-mode output: one tar per collection, entries
/// appended through a shared [`ArchiveRegistry`].
pub struct ArchiveChunkSink {
    registry: Arc<ArchiveRegistry>,
    archives: HashMap<CollectionLabel, PathBuf>,
    format: Format,
}

impl ArchiveChunkSink {
    /// `archives` maps each collection label to its `.tar` path.
    #[must_use]
    pub fn new(
        registry: Arc<ArchiveRegistry>,
        archives: HashMap<CollectionLabel, PathBuf>,
        format: Format,
    ) -> Self {
        Self {
            registry,
            archives,
            format,
        }
    }
}

impl ChunkSink for ArchiveChunkSink {
    fn open(
        &mut self,
        label: CollectionLabel,
        chunk: u64,
        _format_tag: &str,
    ) -> io::Result<Box<dyn ChunkWriter>> {
        let tar_path = self
            .archives
            .get(&label)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no archive path for collection {label}"),
                )
            })?
            .clone();
        let entry_name = self.format.chunk_file_name(label, chunk);
        let registry = Arc::clone(&self.registry);
        Ok(Box::new(BufferedChunkWriter {
            buf: Vec::new(),
            format: self.format,
            commit: Some(move |wrapped: Vec<u8>| {
                registry.append_chunk(&tar_path, &entry_name, &wrapped)
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> CollectionLabel {
        s.parse().unwrap()
    }

    #[test]
    fn file_sink_writes_named_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut directories = HashMap::new();
        directories.insert(label("2A3"), dir.path().to_path_buf());
        let mut sink = FileChunkSink::new(directories, Format::Bin);

        let mut writer = sink.open(label("2A3"), 1, "bin").unwrap();
        writer.write_all(b"chunk contents").unwrap();
        writer.close().unwrap();

        let written = fs::read(dir.path().join("2A3_0001.bin")).unwrap();
        assert_eq!(written, b"chunk contents");
    }

    #[test]
    fn file_sink_png_wraps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut directories = HashMap::new();
        directories.insert(label("2A3"), dir.path().to_path_buf());
        let mut sink = FileChunkSink::new(directories, Format::Png);

        let mut writer = sink.open(label("2A3"), 1, "png").unwrap();
        writer.write_all(b"stego payload").unwrap();
        writer.close().unwrap();

        let written = fs::read(dir.path().join("IMG2A3_0001.PNG")).unwrap();
        assert_eq!(Format::Png.unwrap(&written).unwrap(), b"stego payload");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut sink = FileChunkSink::new(HashMap::new(), Format::Bin);
        assert!(sink.open(label("2A3"), 1, "bin").is_err());
    }

    #[test]
    fn registry_appends_and_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("2A3.tar");
        let registry = ArchiveRegistry::new();
        registry
            .append_chunk(&tar_path, "2A3_0001.bin", b"first")
            .unwrap();
        registry
            .append_chunk(&tar_path, "2A3_0002.bin", b"second")
            .unwrap();
        assert_eq!(registry.open_count(), 1);
        registry.finalize_all().unwrap();
        assert_eq!(registry.open_count(), 0);

        let mut archive = tar::Archive::new(File::open(&tar_path).unwrap());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["2A3_0001.bin", "2A3_0002.bin"]);
    }

    #[test]
    fn archive_sink_appends_wrapped_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("2B3.tar");
        let registry = Arc::new(ArchiveRegistry::new());
        let mut archives = HashMap::new();
        archives.insert(label("2B3"), tar_path.clone());
        let mut sink = ArchiveChunkSink::new(Arc::clone(&registry), archives, Format::Png);

        let mut writer = sink.open(label("2B3"), 1, "png").unwrap();
        writer.write_all(b"in the tar").unwrap();
        writer.close().unwrap();
        registry.finalize_all().unwrap();

        let mut archive = tar::Archive::new(File::open(&tar_path).unwrap());
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(
            entry.path().unwrap().display().to_string(),
            "IMG2B3_0001.PNG"
        );
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut raw).unwrap();
        assert_eq!(Format::Png.unwrap(&raw).unwrap(), b"in the tar");
    }
}
