//! The entropy source contract.

/// Failure of an entropy source.
///
/// Carries the source identifier so orchestration layers can report which
/// generator failed. Callers surface this error; no layer retries.
#[derive(Debug, Clone)]
pub struct EntropyError {
    /// Identifier of the failing source.
    pub source: &'static str,
    /// Human-readable failure description.
    pub reason: String,
}

impl EntropyError {
    pub(crate) fn new(source: &'static str, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EntropyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entropy source '{}' failed: {}", self.source, self.reason)
    }
}

impl std::error::Error for EntropyError {}

/// A generator that fills byte buffers with random data.
///
/// Implementations must serialise concurrent callers internally and must
/// never partially fill a buffer: on return with `Ok(())` every byte of
/// `buf` has been overwritten.
pub trait EntropySource: Send + Sync {
    /// Identifier used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Fill `buf` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError`] when the underlying generator fails.
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError>;
}
