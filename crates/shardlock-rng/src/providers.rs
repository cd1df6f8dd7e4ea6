//! Concrete entropy sub-sources.
//!
//! Each provider owns its generator state behind a [`parking_lot::Mutex`] so
//! `fill` may be called from any task. Seeding failures surface at
//! construction; a provider that constructed successfully can only fail in
//! `fill` if its backing generator does (only the OS source can).
//!
//! The seeded generators do not expose zeroizing hooks, so each provider's
//! drop overwrites its generator state in place with a fixed seed. No
//! keystream or seed-derived state outlives the provider.

#![allow(clippy::cast_possible_truncation)]

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_mt::Mt64;
use rand_pcg::Pcg64;

use crate::source::{EntropyError, EntropySource};

/// Fill a seed buffer from the operating system CSPRNG.
fn os_seed<const N: usize>(for_source: &'static str) -> Result<[u8; N], EntropyError> {
    let mut seed = [0u8; N];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| EntropyError::new(for_source, format!("seeding failed: {e}")))?;
    Ok(seed)
}

/// The operating system's cryptographic random number generator.
///
/// This is the anchor source: as long as it delivers, the composite output
/// is cryptographically uniform regardless of the other sub-sources.
pub struct OsEntropy {
    lock: Mutex<()>,
}

impl OsEntropy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for OsEntropy {
    fn name(&self) -> &'static str {
        "os"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        let _guard = self.lock.lock();
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError::new(self.name(), e.to_string()))
    }
}

/// A general-purpose PRNG seeded once from OS randomness.
///
/// Not cryptographically strong on its own; it contributes mixing depth to
/// the composite and must never be used standalone for pad material.
pub struct SeededPrng {
    rng: Mutex<StdRng>,
}

impl SeededPrng {
    /// # Errors
    ///
    /// Returns [`EntropyError`] when OS seeding fails.
    pub fn from_os() -> Result<Self, EntropyError> {
        let seed = os_seed::<32>("std")?;
        Ok(Self {
            rng: Mutex::new(StdRng::from_seed(seed)),
        })
    }
}

impl EntropySource for SeededPrng {
    fn name(&self) -> &'static str {
        "std"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

impl Drop for SeededPrng {
    fn drop(&mut self) {
        *self.rng.lock() = StdRng::from_seed([0u8; 32]);
    }
}

/// A ChaCha20 keystream generator seeded from OS randomness.
pub struct ChaChaStream {
    rng: Mutex<ChaCha20Rng>,
}

impl ChaChaStream {
    /// # Errors
    ///
    /// Returns [`EntropyError`] when OS seeding fails.
    pub fn from_os() -> Result<Self, EntropyError> {
        let seed = os_seed::<32>("chacha20")?;
        Ok(Self {
            rng: Mutex::new(ChaCha20Rng::from_seed(seed)),
        })
    }
}

impl EntropySource for ChaChaStream {
    fn name(&self) -> &'static str {
        "chacha20"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

impl Drop for ChaChaStream {
    fn drop(&mut self) {
        *self.rng.lock() = ChaCha20Rng::from_seed([0u8; 32]);
    }
}

/// PCG64 seeded from OS randomness mixed with the wall clock.
///
/// The time mix keeps two processes seeded in the same instant from sharing
/// a stream even if the OS seed were somehow replayed.
pub struct Pcg64Source {
    rng: Mutex<Pcg64>,
}

impl Pcg64Source {
    /// # Errors
    ///
    /// Returns [`EntropyError`] when OS seeding fails.
    pub fn from_os() -> Result<Self, EntropyError> {
        let seed = os_seed::<8>("pcg64")?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        let rng = Pcg64::seed_from_u64(u64::from_le_bytes(seed) ^ nanos);
        Ok(Self {
            rng: Mutex::new(rng),
        })
    }
}

impl EntropySource for Pcg64Source {
    fn name(&self) -> &'static str {
        "pcg64"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

impl Drop for Pcg64Source {
    fn drop(&mut self) {
        *self.rng.lock() = Pcg64::seed_from_u64(0);
    }
}

/// MT19937-64 seeded from OS randomness.
pub struct MersenneSource {
    rng: Mutex<Mt64>,
}

impl MersenneSource {
    /// # Errors
    ///
    /// Returns [`EntropyError`] when OS seeding fails.
    pub fn from_os() -> Result<Self, EntropyError> {
        let seed = os_seed::<8>("mt19937")?;
        Ok(Self {
            rng: Mutex::new(Mt64::seed_from_u64(u64::from_le_bytes(seed))),
        })
    }
}

impl EntropySource for MersenneSource {
    fn name(&self) -> &'static str {
        "mt19937"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

impl Drop for MersenneSource {
    fn drop(&mut self) {
        *self.rng.lock() = Mt64::seed_from_u64(0);
    }
}
