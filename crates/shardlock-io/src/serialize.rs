//! Directory tree <-> tar stream.

use std::io::{self, Read, Write};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::LayoutError;

/// Totals from packing a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackSummary {
    /// Regular files packed.
    pub files: u64,
    /// File content bytes packed.
    pub bytes: u64,
}

/// Totals from unpacking a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Regular files restored.
    pub files: u64,
    /// File content bytes restored.
    pub bytes: u64,
}

/// Pack `input_dir` into a tar stream written to `out`.
///
/// Entries use paths relative to `input_dir`; the directory itself is not an
/// entry. Modes and mtimes are preserved; symlinks are skipped. Entries are
/// walked in sorted order so the stream is deterministic for a given tree.
///
/// # Errors
///
/// Returns [`LayoutError`] on any walk or write failure.
pub fn pack_tree<W: Write>(input_dir: &Path, out: W) -> Result<PackSummary, LayoutError> {
    let mut builder = tar::Builder::new(out);
    builder.follow_symlinks(false);
    let mut summary = PackSummary::default();

    for entry in WalkDir::new(input_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(into_io_error)?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(input_dir)
            .map_err(|e| LayoutError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        if file_type.is_dir() {
            builder.append_dir(rel, entry.path())?;
        } else if file_type.is_file() {
            let len = entry.metadata().map_err(into_io_error)?.len();
            builder.append_path_with_name(entry.path(), rel)?;
            summary.files += 1;
            summary.bytes += len;
            tracing::debug!(path = %rel.display(), len, "packed file");
        }
    }

    builder.finish()?;
    tracing::debug!(files = summary.files, bytes = summary.bytes, "pack complete");
    Ok(summary)
}

/// Unpack a tar stream into `output_dir`.
///
/// Paths are confined to `output_dir`; modes are restored and mtimes are
/// restored at second granularity. An empty stream unpacks to nothing.
///
/// # Errors
///
/// Returns [`LayoutError`] on malformed archives or write failures.
pub fn unpack_tree<R: Read>(reader: R, output_dir: &Path) -> Result<UnpackSummary, LayoutError> {
    std::fs::create_dir_all(output_dir)?;
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    let mut summary = UnpackSummary::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let size = entry.header().size()?;
        let is_file = entry.header().entry_type().is_file();
        entry.unpack_in(output_dir)?;
        if is_file {
            summary.files += 1;
            summary.bytes += size;
        }
    }

    tracing::debug!(
        files = summary.files,
        bytes = summary.bytes,
        "unpack complete"
    );
    Ok(summary)
}

fn into_io_error(err: walkdir::Error) -> LayoutError {
    let message = err.to_string();
    LayoutError::Io(
        err.into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message)),
    )
}
