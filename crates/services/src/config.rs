use std::env;
use std::time::Duration;

use lms_core::model::CompletionThreshold;
use rand::Rng;
use reqwest::Url;

use crate::error::ConfigError;

/// Bounded retry with exponential backoff for progress writes.
///
/// Beacon deliveries are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to half of `base` of random jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1_u32 << attempt.saturating_sub(1).min(16));
        let jitter_cap = u64::try_from(self.base_backoff.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        exp.saturating_add(Duration::from_millis(jitter))
    }
}

/// Timing and policy knobs of the watch tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Quiet period after the last accepted sample before it is written.
    pub debounce: Duration,
    /// Period of the safety-net writer during long uninterrupted playback.
    pub safety_net_interval: Duration,
    /// Delay between a session completing and the course completion check.
    pub completion_check_delay: Duration,
    /// Used when the course has no stored threshold.
    pub default_threshold: CompletionThreshold,
    pub retry: RetryPolicy,
    /// Endpoint for unload-time beacons; `None` writes them straight to the store.
    ///
    /// Nothing in this workspace serves it. The receiving service must apply each
    /// `BeaconPayload` the way `StoreBeacon` does: `apply_progress` for the
    /// optional write, then `mark_seen` with `seen_at`.
    pub beacon_url: Option<Url>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            safety_net_interval: Duration::from_secs(5),
            completion_check_delay: Duration::from_secs(2),
            default_threshold: CompletionThreshold::default(),
            retry: RetryPolicy::default(),
            beacon_url: None,
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `LEARN_TRACKER_*` / `LEARN_BEACON_URL` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let read = |key: &'static str| {
            lookup(key)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(raw) = read("LEARN_TRACKER_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(parse_u64("LEARN_TRACKER_DEBOUNCE_MS", &raw)?);
        }
        if let Some(raw) = read("LEARN_TRACKER_SAFETY_NET_SECS") {
            let secs = parse_u64("LEARN_TRACKER_SAFETY_NET_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "LEARN_TRACKER_SAFETY_NET_SECS",
                    raw,
                });
            }
            config.safety_net_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = read("LEARN_TRACKER_COMPLETION_CHECK_DELAY_MS") {
            config.completion_check_delay = Duration::from_millis(parse_u64(
                "LEARN_TRACKER_COMPLETION_CHECK_DELAY_MS",
                &raw,
            )?);
        }
        if let Some(raw) = read("LEARN_TRACKER_COMPLETION_THRESHOLD") {
            config.default_threshold = raw
                .parse::<f64>()
                .ok()
                .and_then(|v| CompletionThreshold::new(v).ok())
                .ok_or(ConfigError::InvalidValue {
                    key: "LEARN_TRACKER_COMPLETION_THRESHOLD",
                    raw: raw.clone(),
                })?;
        }
        if let Some(raw) = read("LEARN_TRACKER_WRITE_RETRIES") {
            config.retry.max_retries = raw.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: "LEARN_TRACKER_WRITE_RETRIES",
                raw: raw.clone(),
            })?;
        }
        if let Some(raw) = read("LEARN_TRACKER_RETRY_BACKOFF_MS") {
            config.retry.base_backoff =
                Duration::from_millis(parse_u64("LEARN_TRACKER_RETRY_BACKOFF_MS", &raw)?);
        }
        if let Some(raw) = read("LEARN_BEACON_URL") {
            let url = Url::parse(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "LEARN_BEACON_URL",
                raw: raw.clone(),
            })?;
            config.beacon_url = Some(url);
        }

        Ok(config)
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        raw: raw.to_owned(),
    })
}
