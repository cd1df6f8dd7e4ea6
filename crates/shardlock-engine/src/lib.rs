//! Pipeline orchestration for shardlock.
//!
//! The engine wires the boundary collaborators to the threshold codec:
//!
//! ```text
//! encode: dir -> tar -> gzip -> stream codec -> { collection chunks } -> bin/png/tar
//! decode: bin/png/tar -> { collection chunks } -> stream codec -> gunzip -> untar -> dir
//! ```
//!
//! Each direction runs as two cooperating tasks, the codec on the calling
//! thread and the (de)serialiser on a worker, joined by a single bounded
//! byte [`pipe`]. The pipe is the only shared state: closing it (optionally
//! with a typed error) is the one cancellation path, and a watchdog bounds
//! the join so a wedged peer surfaces as
//! [`EngineError::PipelineTimeout`] instead of a hang.

#![forbid(unsafe_code)]

pub mod config;
mod decode;
mod encode;
mod error;
pub mod pipe;
mod sizing;
mod verify;

pub use config::{default_join_timeout, TEST_ENV_MARKER};
pub use decode::{decode, DecodeOptions, DecodeReport};
pub use encode::{encode, CollectionOutput, EncodeOptions, EncodeReport};
pub use error::EngineError;
pub use sizing::SizeReport;
pub use verify::VerifyReport;
