//! Entropy sources for one-time-pad material.
//!
//! Pad confidentiality in a one-time-pad scheme is exactly as good as the
//! randomness that fills the pads, so this crate never relies on a single
//! generator. [`MultiRng`] XOR-combines independent sub-sources: the XOR of
//! independent streams is uniform as long as at least one input is uniform,
//! so a weak or compromised sub-source cannot reduce the output below the
//! strength of the best surviving one.
//!
//! # Sub-sources
//!
//! - [`OsEntropy`] - the operating system CSPRNG
//! - [`SeededPrng`] - a `StdRng` seeded from OS randomness
//! - [`ChaChaStream`] - a ChaCha20 keystream seeded from OS randomness
//! - [`Pcg64Source`] - PCG64 seeded from OS randomness mixed with wall-clock
//! - [`MersenneSource`] - MT19937-64 seeded from OS randomness
//!
//! Every source serialises concurrent callers behind an internal mutex and
//! surfaces failures as [`EntropyError`]; nothing fails silently and nothing
//! retries.
//!
//! # Example
//!
//! ```rust
//! use shardlock_rng::{EntropySource, MultiRng};
//!
//! let rng = MultiRng::with_default_sources().unwrap();
//! let mut pad = vec![0u8; 64];
//! rng.fill(&mut pad).unwrap();
//! ```

#![forbid(unsafe_code)]

mod composite;
mod providers;
mod source;

pub use composite::MultiRng;
pub use providers::{ChaChaStream, MersenneSource, OsEntropy, Pcg64Source, SeededPrng};
pub use source::{EntropyError, EntropySource};
