//! Filesystem boundary for the shardlock codec.
//!
//! Everything that touches disk lives here, keeping the threshold scheme in
//! `shardlock-pad` packaging-agnostic:
//!
//! - [`serialize`] - directory tree <-> tar stream
//! - [`compress`] - gzip with magic-byte sniffing on the way back in
//! - [`Format`] - the raw-binary and PNG chunk wrappers
//! - [`collection`] - locating collections on disk and streaming their
//!   chunks back out
//! - [`ArchiveRegistry`] - per-collection tar outputs held open across
//!   chunks and drained by a finalise pass
//! - [`dir`] - input validation and output preparation

#![forbid(unsafe_code)]

pub mod archive;
pub mod collection;
pub mod compress;
pub mod dir;
mod error;
mod format;
mod png;
pub mod serialize;

pub use archive::{ArchiveChunkSink, ArchiveRegistry, FileChunkSink};
pub use collection::{discover_collections, Collection, CollectionChunks};
pub use error::{FormatError, LayoutError};
pub use format::Format;
