//! XOR combination of independent entropy sources.

use zeroize::Zeroize;

use crate::providers::{ChaChaStream, MersenneSource, OsEntropy, Pcg64Source, SeededPrng};
use crate::source::{EntropyError, EntropySource};

/// Combines independent sub-sources by XOR.
///
/// For each `fill`, every sub-source fills a temporary buffer of the
/// requested length and the temporaries are XORed into the output. The
/// temporaries are zeroized before release. A `MultiRng` holds at least one
/// source; construction with an empty set is rejected.
pub struct MultiRng {
    sources: Vec<Box<dyn EntropySource>>,
}

impl MultiRng {
    /// Build a composite over the given sub-sources.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError`] when `sources` is empty.
    pub fn new(sources: Vec<Box<dyn EntropySource>>) -> Result<Self, EntropyError> {
        if sources.is_empty() {
            return Err(EntropyError {
                source: "multi",
                reason: "at least one sub-source is required".to_string(),
            });
        }
        Ok(Self { sources })
    }

    /// Build the default five-source composite.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError`] when any sub-source fails to seed from the
    /// operating system.
    pub fn with_default_sources() -> Result<Self, EntropyError> {
        let sources: Vec<Box<dyn EntropySource>> = vec![
            Box::new(OsEntropy::new()),
            Box::new(SeededPrng::from_os()?),
            Box::new(ChaChaStream::from_os()?),
            Box::new(Pcg64Source::from_os()?),
            Box::new(MersenneSource::from_os()?),
        ];
        tracing::debug!(sources = sources.len(), "initialized composite rng");
        Self::new(sources)
    }

    /// Number of combined sub-sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl EntropySource for MultiRng {
    fn name(&self) -> &'static str {
        "multi"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        buf.fill(0);
        let mut tmp = vec![0u8; buf.len()];
        let mut result = Ok(());
        for source in &self.sources {
            if let Err(e) = source.fill(&mut tmp) {
                tracing::error!(source = source.name(), error = %e, "entropy source failed");
                result = Err(e);
                break;
            }
            for (out, t) in buf.iter_mut().zip(tmp.iter()) {
                *out ^= *t;
            }
        }
        tmp.zeroize();
        result
    }
}
