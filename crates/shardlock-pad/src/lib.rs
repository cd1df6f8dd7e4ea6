//! K-of-N threshold one-time-pad codec.
//!
//! This crate implements the combinatorial heart of shardlock: a byte stream
//! is split into N labelled collections such that any K of them jointly
//! reconstruct the stream while any K-1 are statistically indistinguishable
//! from uniform randomness.
//!
//! # Scheme
//!
//! For parameters `2 <= K <= N <= 26`, the `C(N, K-1)` subsets of `{1..N}`
//! of size K-1 are enumerated in lexicographic order; each subset is a **pad
//! slot** holding one uniformly random byte string per chunk, except for one
//! injection slot whose pad is the XOR of the plaintext with every other
//! pad. A slot is distributed to every collection *not* in its subset, so
//! each collection carries `C(N-1, K-1)` pads per chunk and any K
//! collections jointly cover every slot. XORing one copy of every slot's pad
//! reproduces the plaintext; any K-1 collections see only independent
//! uniform pads.
//!
//! # Layers
//!
//! - [`CollectionLabel`] - the `"<K><letter><N>"` share label, which also
//!   lets the decoder recover the scheme parameters from the wire
//! - [`frame`] - the strict per-slot on-wire framing
//! - [`PadEncoder`] / [`PadDecoder`] - per-chunk scheme operations and the
//!   chunk-sequencing state machine
//! - [`StreamEncoder`] - drives the scheme over a byte stream of arbitrary
//!   length through a per-chunk writer factory
//! - [`CollectionStream`] - adapts a chunk-at-a-time source into the lazy
//!   byte stream the decoder consumes
//!
//! Pad material is sampled fresh per chunk and zeroized before release; it
//! is never reused across chunks, collections, or invocations.

#![forbid(unsafe_code)]

mod decode;
mod encode;
mod error;
pub mod frame;
mod label;
mod reader;
mod stream;
pub mod subsets;

pub use decode::{DecodeSummary, PadDecoder};
pub use encode::PadEncoder;
pub use error::{CodecError, SchemeError, MAX_COLLECTIONS, MIN_COLLECTIONS};
pub use label::{CollectionLabel, LabelError};
pub use reader::{ChunkSource, CollectionStream};
pub use stream::{ChunkSink, ChunkWriter, EncodeSummary, StreamEncoder, DEFAULT_CHUNK_SIZE};
