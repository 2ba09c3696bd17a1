//! Engine settings read from the environment, with defaults.

use std::time::Duration;

pub const DEFAULT_QUIET_PERIOD_MS: u64 = 1000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_MAX_FIELD_ID_LEN: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Coalescer quiet period after a field's last edit.
    pub quiet_period: Duration,
    /// Delay before the coalescer retries a batch the sink rejected.
    pub retry_interval: Duration,
    /// Slug length cap for extracted field ids.
    pub max_field_id_len: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            max_field_id_len: DEFAULT_MAX_FIELD_ID_LEN,
        }
    }
}

impl EngineSettings {
    /// `DOCFORM_QUIET_PERIOD_MS`, `DOCFORM_RETRY_INTERVAL_MS`, `DOCFORM_MAX_FIELD_ID_LEN`.
    pub fn from_env() -> Self {
        EngineSettings {
            quiet_period: Duration::from_millis(env_or("DOCFORM_QUIET_PERIOD_MS", DEFAULT_QUIET_PERIOD_MS)),
            retry_interval: Duration::from_millis(env_or("DOCFORM_RETRY_INTERVAL_MS", DEFAULT_RETRY_INTERVAL_MS)),
            max_field_id_len: env_or("DOCFORM_MAX_FIELD_ID_LEN", DEFAULT_MAX_FIELD_ID_LEN).max(1),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = EngineSettings::default();
        assert_eq!(s.quiet_period, Duration::from_secs(1));
        assert_eq!(s.retry_interval, Duration::from_secs(5));
        assert_eq!(s.max_field_id_len, 50);
    }

    #[test]
    fn unparsable_values_fall_back() {
        assert_eq!(env_or("DOCFORM_TEST_UNSET_KEY", 7u64), 7);
    }
}
