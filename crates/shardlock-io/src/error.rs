//! I/O layer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Chunk wrapper violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The PNG carries no payload chunk.
    #[error("png payload chunk not found")]
    MissingPayloadChunk,

    /// The payload chunk's CRC does not match its contents.
    #[error("png payload chunk crc mismatch")]
    CrcMismatch,

    /// The container bytes are structurally invalid.
    #[error("invalid wrapper structure: {reason}")]
    InvalidStructure {
        /// What was violated.
        reason: String,
    },
}

impl FormatError {
    pub(crate) fn structure(reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            reason: reason.into(),
        }
    }
}

/// Filesystem layout failures.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The input path is missing or not a directory.
    #[error("input directory {path} does not exist or is not a directory")]
    BadInputDir {
        /// The offending path.
        path: PathBuf,
    },

    /// No collection could be located under the given inputs.
    #[error("no collections found in {path}")]
    NoCollections {
        /// The searched path.
        path: PathBuf,
    },

    /// A directory or archive that holds chunk files but yields no
    /// collection label.
    #[error("chunk files at {path} do not identify a collection")]
    UnidentifiedCollection {
        /// The offending path.
        path: PathBuf,
    },

    /// An underlying filesystem operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
