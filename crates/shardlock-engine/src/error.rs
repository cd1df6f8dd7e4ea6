//! Engine error type.

use shardlock_io::LayoutError;
use shardlock_pad::CodecError;
use thiserror::Error;

/// Any failure surfacing from an encode or decode pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The threshold codec failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The filesystem layer failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Output destinations do not match the scheme.
    #[error("output layout mismatch: {reason}")]
    OutputMismatch {
        /// What disagreed.
        reason: String,
    },

    /// A pipeline peer failed to quiesce within the join deadline.
    #[error("pipeline join timed out after {seconds}s")]
    PipelineTimeout {
        /// The deadline that elapsed.
        seconds: u64,
    },

    /// A bare I/O failure outside the layers above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
