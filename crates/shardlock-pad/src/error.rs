//! Codec error types.

use shardlock_rng::EntropyError;
use thiserror::Error;

/// Minimum number of collections in a scheme.
pub const MIN_COLLECTIONS: usize = 2;

/// Maximum number of collections in a scheme (one per letter A-Z).
pub const MAX_COLLECTIONS: usize = 26;

/// Invalid scheme parameters, rejected at setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    /// Total collections outside `[2, 26]`.
    #[error("total collections must be between {MIN_COLLECTIONS} and {MAX_COLLECTIONS}, got {0}")]
    TotalOutOfRange(usize),

    /// Required collections below the minimum of 2.
    #[error("required collections must be at least {MIN_COLLECTIONS}, got {0}")]
    RequiredTooSmall(usize),

    /// Required collections exceeding the total.
    #[error("required collections ({required}) cannot exceed total collections ({total})")]
    RequiredExceedsTotal {
        /// The requested threshold.
        required: usize,
        /// The total number of collections.
        total: usize,
    },
}

/// Errors raised while encoding or decoding a stream.
///
/// No kind is retried inside the codec; any error poisons the run and
/// surfaces to the orchestrator.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Invalid scheme parameters.
    #[error(transparent)]
    Scheme(#[from] SchemeError),

    /// An entropy source failed while sampling pad material.
    #[error("entropy failure: {0}")]
    Entropy(#[from] EntropyError),

    /// A chunk frame violated the on-wire layout.
    #[error("malformed chunk frame: {reason}")]
    Frame {
        /// What the parser rejected.
        reason: String,
    },

    /// Fewer collections were supplied than the scheme requires.
    #[error("need {required} collections to decode, only {available} available")]
    ShortCollection {
        /// Collections required by the pinned scheme.
        required: usize,
        /// Collections actually supplied.
        available: usize,
    },

    /// One collection hit end-of-stream at a boundary where others did not.
    #[error("collection {label} ran out of data at chunk {chunk}")]
    UnevenEof {
        /// The collection that ended early.
        label: String,
        /// The chunk number at which it ended.
        chunk: u64,
    },

    /// Two collections carried different bytes for the same pad slot.
    #[error("conflicting pad copies for slot {slot} of chunk {chunk}")]
    CollectionMismatch {
        /// The slot index with diverging copies.
        slot: usize,
        /// The chunk number.
        chunk: u64,
    },

    /// An underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn frame(reason: impl Into<String>) -> Self {
        Self::Frame {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_error_display() {
        assert_eq!(
            SchemeError::TotalOutOfRange(27).to_string(),
            "total collections must be between 2 and 26, got 27"
        );
        assert_eq!(
            SchemeError::RequiredTooSmall(1).to_string(),
            "required collections must be at least 2, got 1"
        );
        assert_eq!(
            SchemeError::RequiredExceedsTotal {
                required: 6,
                total: 5
            }
            .to_string(),
            "required collections (6) cannot exceed total collections (5)"
        );
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::ShortCollection {
            required: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "need 3 collections to decode, only 2 available"
        );

        let err = CodecError::CollectionMismatch { slot: 4, chunk: 2 };
        assert_eq!(
            err.to_string(),
            "conflicting pad copies for slot 4 of chunk 2"
        );
    }
}
