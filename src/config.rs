use tokio::time::Duration;

/// Tuning knobs for the trading loop.
///
/// The backoff values are carried-over tuning defaults, not load-bearing
/// constants; every one of them can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct TraderConfig {
    /// Sleep between ticks.
    pub poll_interval: Duration,
    /// Seconds past the minute/second boundary during which the loop is
    /// allowed to sync and submit.
    pub action_window_secs: u32,
    /// Spacing between per-feed reclassification rounds within a tick.
    pub retry_backoff: Duration,
    /// Reclassification rounds allowed per tick before giving up.
    pub max_sync_retries: u32,
    /// Long backoff after a stale-data abort, to avoid hammering a degraded
    /// provider.
    pub stale_backoff: Duration,
    /// Spacing between cancel calls, respecting broker rate limits.
    pub cancel_delay: Duration,
    /// End-of-day liquidation minute (UTC).
    pub eod_hour: u32,
    pub eod_minute: u32,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            action_window_secs: 10,
            retry_backoff: Duration::from_millis(300),
            max_sync_retries: 5,
            stale_backoff: Duration::from_secs(50),
            cancel_delay: Duration::from_millis(10),
            eod_hour: 20,
            eod_minute: 59,
        }
    }
}

impl TraderConfig {
    /// Defaults overridden by environment variables where present.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: env_secs_f64("POLL_INTERVAL_SECS")
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.poll_interval),
            action_window_secs: env_parse("ACTION_WINDOW_SECS")
                .unwrap_or(defaults.action_window_secs),
            retry_backoff: env_secs_f64("RETRY_BACKOFF_SECS")
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.retry_backoff),
            max_sync_retries: env_parse("MAX_SYNC_RETRIES")
                .unwrap_or(defaults.max_sync_retries),
            stale_backoff: env_secs_f64("STALE_BACKOFF_SECS")
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.stale_backoff),
            cancel_delay: env_secs_f64("CANCEL_DELAY_SECS")
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.cancel_delay),
            eod_hour: env_parse("EOD_HOUR").unwrap_or(defaults.eod_hour),
            eod_minute: env_parse("EOD_MINUTE").unwrap_or(defaults.eod_minute),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Seconds from the environment; negative or non-finite values are rejected
/// (they would panic in `Duration::from_secs_f64`) and the default applies.
fn env_secs_f64(key: &str) -> Option<f64> {
    env_parse::<f64>(key).filter(|secs| {
        let valid = secs.is_finite() && *secs >= 0.0;
        if !valid {
            tracing::warn!(key, secs, "Ignoring invalid duration override");
        }
        valid
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_tuning() {
        let config = TraderConfig::default();
        assert_eq!(config.retry_backoff, Duration::from_millis(300));
        assert_eq!(config.stale_backoff, Duration::from_secs(50));
        assert_eq!(config.action_window_secs, 10);
        assert_eq!((config.eod_hour, config.eod_minute), (20, 59));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("MAX_SYNC_RETRIES", "9");
        let config = TraderConfig::from_env();
        assert_eq!(config.max_sync_retries, 9);
        std::env::remove_var("MAX_SYNC_RETRIES");
    }

    #[test]
    fn test_invalid_duration_override_falls_back_to_default() {
        for bad in ["-1", "NaN", "inf"] {
            std::env::set_var("STALE_BACKOFF_SECS", bad);
            let config = TraderConfig::from_env();
            assert_eq!(config.stale_backoff, Duration::from_secs(50), "{bad}");
        }
        std::env::remove_var("STALE_BACKOFF_SECS");
    }
}
