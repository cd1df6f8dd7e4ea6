//! Chunk packaging formats.

use serde::{Deserialize, Serialize};
use shardlock_pad::CollectionLabel;

use crate::error::FormatError;
use crate::png;

/// How a collection's chunk files are packaged on disk.
///
/// A tagged variant, not a trait object: each format is a fixed pairing of
/// file naming and wrap/unwrap functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Raw binary chunk files, `<collection>_<NNNN>.bin`.
    Bin,
    /// PNG-wrapped chunk files, `IMG<collection>_<NNNN>.PNG`.
    #[default]
    Png,
}

impl Format {
    /// Short tag used in frames, flags, and logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Bin => "bin",
            Self::Png => "png",
        }
    }

    /// The on-disk file name for one chunk of one collection.
    #[must_use]
    pub fn chunk_file_name(self, label: CollectionLabel, chunk: u64) -> String {
        match self {
            Self::Bin => format!("{label}_{chunk:04}.bin"),
            Self::Png => format!("IMG{label}_{chunk:04}.PNG"),
        }
    }

    /// Whether `file_name` looks like one of this format's chunk files.
    #[must_use]
    pub fn matches_chunk_file(self, file_name: &str) -> bool {
        match self {
            Self::Bin => file_name.ends_with(".bin"),
            Self::Png => {
                let upper = file_name.to_ascii_uppercase();
                upper.ends_with(".PNG")
            }
        }
    }

    /// Package one chunk's frame bytes into file contents.
    #[must_use]
    pub fn wrap(self, chunk_bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Bin => chunk_bytes.to_vec(),
            Self::Png => png::wrap_payload(chunk_bytes),
        }
    }

    /// Recover one chunk's frame bytes from file contents.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the wrapper is damaged (PNG only; raw
    /// binary has no integrity layer of its own).
    pub fn unwrap(self, file_bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
        match self {
            Self::Bin => Ok(file_bytes.to_vec()),
            Self::Png => png::extract_payload(file_bytes),
        }
    }

    /// Exact wrapped size for a chunk of `payload_len` frame bytes.
    #[must_use]
    pub fn wrapped_len(self, payload_len: usize) -> usize {
        match self {
            Self::Bin => payload_len,
            Self::Png => png::wrapped_len(payload_len),
        }
    }
}
