//! Locating collections on disk and streaming their chunks.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use shardlock_pad::{ChunkSource, CollectionLabel};

use crate::dir::validate_input_dir;
use crate::error::LayoutError;
use crate::format::Format;

/// One share of an encoded archive as found on disk: either a directory of
/// chunk files or a `.tar` archive of them.
#[derive(Debug, Clone)]
pub struct Collection {
    /// The collection's label.
    pub label: CollectionLabel,
    /// Directory or archive path.
    pub path: PathBuf,
    /// Chunk packaging format.
    pub format: Format,
}

impl Collection {
    /// Whether this collection is a tar archive rather than a directory.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "tar")
    }
}

/// Derive a collection label from a chunk file name like `3A5_0001.bin` or
/// `IMG3A5_0001.PNG`.
fn label_from_chunk_file(name: &str) -> Option<CollectionLabel> {
    let stem = name.strip_prefix("IMG").unwrap_or(name);
    let (prefix, _) = stem.split_once('_')?;
    prefix.parse().ok()
}

/// Classify a file name as one of the chunk formats.
fn chunk_format_of(name: &str) -> Option<Format> {
    if name.to_ascii_uppercase().ends_with(".PNG") {
        Some(Format::Png)
    } else if name.ends_with(".bin") {
        Some(Format::Bin)
    } else {
        None
    }
}

/// Inspect a directory for chunk files. `None` when it holds none; chunk
/// files with no derivable label are [`LayoutError::UnidentifiedCollection`].
fn collection_at(dir: &Path) -> Result<Option<Collection>, LayoutError> {
    let mut format = None;
    let mut file_label = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(found) = chunk_format_of(&name) {
            format = Some(found);
            if file_label.is_none() {
                file_label = label_from_chunk_file(&name);
            }
            if file_label.is_some() {
                break;
            }
        }
    }
    let Some(format) = format else {
        return Ok(None);
    };

    let dir_label = dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.parse::<CollectionLabel>().ok());
    let Some(label) = dir_label.or(file_label) else {
        return Err(LayoutError::UnidentifiedCollection {
            path: dir.to_path_buf(),
        });
    };

    Ok(Some(Collection {
        label,
        path: dir.to_path_buf(),
        format,
    }))
}

/// Inspect a `.tar` file for chunk entries. `None` when it holds none;
/// chunk entries with no derivable label are
/// [`LayoutError::UnidentifiedCollection`].
fn tar_collection_at(path: &Path) -> Result<Option<Collection>, LayoutError> {
    let stem_label = path
        .file_stem()
        .and_then(|n| n.to_str())
        .and_then(|n| n.parse::<CollectionLabel>().ok());

    let file = File::open(path)?;
    let mut archive = tar::Archive::new(file);
    let mut format = None;
    let mut entry_label = None;
    for entry in archive.entries()? {
        let entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(found) = chunk_format_of(name) {
            format = Some(found);
            entry_label = label_from_chunk_file(name);
            break;
        }
    }
    let Some(format) = format else {
        return Ok(None);
    };
    let Some(label) = stem_label.or(entry_label) else {
        return Err(LayoutError::UnidentifiedCollection {
            path: path.to_path_buf(),
        });
    };

    Ok(Some(Collection {
        label,
        path: path.to_path_buf(),
        format,
    }))
}

/// Locate collections under the given input directories.
///
/// Each input may itself be a collection directory, may contain collection
/// directories and/or `.tar` archives, or both. Results are sorted by label
/// so downstream K-selection is deterministic; duplicate labels keep the
/// first occurrence.
///
/// # Errors
///
/// Returns [`LayoutError::NoCollections`] when nothing is found,
/// [`LayoutError::UnidentifiedCollection`] for chunk files that name no
/// collection, and [`LayoutError`] for unreadable inputs.
pub fn discover_collections(input_dirs: &[PathBuf]) -> Result<Vec<Collection>, LayoutError> {
    let mut found: Vec<Collection> = Vec::new();
    for input in input_dirs {
        validate_input_dir(input)?;
        if let Some(collection) = collection_at(input)? {
            tracing::debug!(label = %collection.label, path = %input.display(), "input is a collection");
            found.push(collection);
            continue;
        }
        for entry in fs::read_dir(input)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if let Some(collection) = collection_at(&path)? {
                    found.push(collection);
                }
            } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "tar") {
                if let Some(collection) = tar_collection_at(&path)? {
                    found.push(collection);
                }
            }
        }
    }

    found.sort_by_key(|c| c.label);
    found.dedup_by(|next, first| {
        if next.label == first.label {
            tracing::warn!(label = %next.label, path = %next.path.display(), "duplicate collection ignored");
            true
        } else {
            false
        }
    });

    if found.is_empty() {
        return Err(LayoutError::NoCollections {
            path: input_dirs.first().cloned().unwrap_or_default(),
        });
    }
    tracing::debug!(count = found.len(), "collections discovered");
    Ok(found)
}

/// Chunk-at-a-time reader over one collection.
pub struct CollectionChunks {
    inner: ChunksInner,
}

enum ChunksInner {
    Dir(DirChunks),
    Tar(TarChunks),
}

struct DirChunks {
    format: Format,
    files: Vec<PathBuf>,
    next: usize,
}

struct TarChunks {
    format: Format,
    path: PathBuf,
    consumed: usize,
}

impl CollectionChunks {
    /// Open a chunk reader for `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Io`] when a directory listing fails.
    pub fn open(collection: &Collection) -> Result<Self, LayoutError> {
        let inner = if collection.is_archive() {
            ChunksInner::Tar(TarChunks {
                format: collection.format,
                path: collection.path.clone(),
                consumed: 0,
            })
        } else {
            let mut files: Vec<PathBuf> = fs::read_dir(&collection.path)?
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| collection.format.matches_chunk_file(n))
                })
                .collect();
            // Zero-padded chunk numbers make the name order the chunk order.
            files.sort();
            ChunksInner::Dir(DirChunks {
                format: collection.format,
                files,
                next: 0,
            })
        };
        Ok(Self { inner })
    }
}

impl ChunkSource for CollectionChunks {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        match &mut self.inner {
            ChunksInner::Dir(dir) => dir.next_chunk(),
            ChunksInner::Tar(tar) => tar.next_chunk(),
        }
    }
}

impl DirChunks {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let raw = fs::read(path)?;
        let payload = self.format.unwrap(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {e}", path.display()),
            )
        })?;
        self.next += 1;
        Ok(Some(payload))
    }
}

impl TarChunks {
    /// Stream the next chunk entry. The archive is reopened and previously
    /// consumed chunk entries skipped; entry bodies before the target are
    /// discarded without unwrapping.
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let file = File::open(&self.path)?;
        let mut archive = tar::Archive::new(file);
        let mut seen = 0usize;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_path = entry.path()?.into_owned();
            let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !self.format.matches_chunk_file(name) {
                continue;
            }
            if seen == self.consumed {
                let mut raw = Vec::new();
                entry.read_to_end(&mut raw)?;
                let payload = self.format.unwrap(&raw).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{} ({name}): {e}", self.path.display()),
                    )
                })?;
                self.consumed += 1;
                return Ok(Some(payload));
            }
            seen += 1;
        }
        Ok(None)
    }
}
