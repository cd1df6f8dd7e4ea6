//! Pipeline tuning shared by both directions.

use std::env;
use std::time::Duration;

/// Environment marker that shortens the pipeline join deadline for tests.
pub const TEST_ENV_MARKER: &str = "SHARDLOCK_TEST";

const PRODUCTION_JOIN_TIMEOUT: Duration = Duration::from_secs(30);
const TEST_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// The join watchdog deadline: 30 s, or 3 s when [`TEST_ENV_MARKER`] is set.
#[must_use]
pub fn default_join_timeout() -> Duration {
    if env::var_os(TEST_ENV_MARKER).is_some() {
        TEST_JOIN_TIMEOUT
    } else {
        PRODUCTION_JOIN_TIMEOUT
    }
}

/// Serde helper for `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
