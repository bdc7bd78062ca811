//! Read configuration.
//!
//! Values can be set in code (`ReaderConfig { limit: 50, ..Default::default() }`)
//! or loaded from `MURMUR_*` environment variables with
//! [`ReaderConfig::from_env`].

use crate::throttle::DEFAULT_WARNING_COOLDOWN;
use crate::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a [`SearchRead`](crate::SearchRead).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Maximum number of records a historical read emits.
    pub limit: usize,

    /// Number of items requested per search page.
    pub fetch_size: usize,

    /// Maximum number of records held in the live reorder buffer.
    pub buffer_limit: usize,

    /// Cadence of watermark ticks in [`run_periodic`](crate::SearchRead::run_periodic).
    pub tick_interval: Duration,

    /// How far behind the quantized current time a tick places the watermark.
    ///
    /// Gives out-of-order live items this long to arrive before their window
    /// is released.
    pub lag: Duration,

    /// Minimum time between two logged warnings of the same kind.
    pub warning_cooldown: Duration,

    /// Upper bound on a single search round trip.
    pub fetch_timeout: Duration,

    /// Retries after the first failed search attempt before the read fails.
    pub fetch_retries: u32,

    /// Backoff before the first retry; doubled for each subsequent retry.
    pub retry_backoff: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            limit: 1000,
            fetch_size: 100,
            buffer_limit: 10_000,
            tick_interval: Duration::from_secs(1),
            lag: Duration::from_secs(2),
            warning_cooldown: DEFAULT_WARNING_COOLDOWN,
            fetch_timeout: Duration::from_secs(30),
            fetch_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset ones keep the default:
    /// - `MURMUR_LIMIT`, `MURMUR_FETCH_SIZE`, `MURMUR_BUFFER_LIMIT`
    /// - `MURMUR_TICK_INTERVAL_MS`, `MURMUR_LAG_MS`, `MURMUR_WARNING_COOLDOWN_MS`
    /// - `MURMUR_FETCH_TIMEOUT_MS`, `MURMUR_FETCH_RETRIES`, `MURMUR_RETRY_BACKOFF_MS`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            limit: env_or("MURMUR_LIMIT", defaults.limit)?,
            fetch_size: env_or("MURMUR_FETCH_SIZE", defaults.fetch_size)?,
            buffer_limit: env_or("MURMUR_BUFFER_LIMIT", defaults.buffer_limit)?,
            tick_interval: env_millis_or("MURMUR_TICK_INTERVAL_MS", defaults.tick_interval)?,
            lag: env_millis_or("MURMUR_LAG_MS", defaults.lag)?,
            warning_cooldown: env_millis_or(
                "MURMUR_WARNING_COOLDOWN_MS",
                defaults.warning_cooldown,
            )?,
            fetch_timeout: env_millis_or("MURMUR_FETCH_TIMEOUT_MS", defaults.fetch_timeout)?,
            fetch_retries: env_or("MURMUR_FETCH_RETRIES", defaults.fetch_retries)?,
            retry_backoff: env_millis_or("MURMUR_RETRY_BACKOFF_MS", defaults.retry_backoff)?,
        };
        config.validate()?;

        tracing::info!(
            limit = config.limit,
            fetch_size = config.fetch_size,
            buffer_limit = config.buffer_limit,
            tick_interval = ?config.tick_interval,
            lag = ?config.lag,
            fetch_timeout = ?config.fetch_timeout,
            fetch_retries = config.fetch_retries,
            "reader configuration loaded"
        );

        Ok(config)
    }

    /// Reject values the read cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be at least 1".to_string()));
        }
        if self.buffer_limit == 0 {
            return Err(Error::Config("buffer_limit must be at least 1".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick_interval must be non-zero".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::Config("fetch_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

fn env_millis_or(key: &str, default: Duration) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    env_or(key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "MURMUR_LIMIT",
        "MURMUR_FETCH_SIZE",
        "MURMUR_BUFFER_LIMIT",
        "MURMUR_TICK_INTERVAL_MS",
        "MURMUR_LAG_MS",
        "MURMUR_WARNING_COOLDOWN_MS",
        "MURMUR_FETCH_TIMEOUT_MS",
        "MURMUR_FETCH_RETRIES",
        "MURMUR_RETRY_BACKOFF_MS",
    ];

    /// Helper to run config tests with isolated env vars.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.limit, 1000);
        assert_eq!(config.fetch_size, 100);
        assert_eq!(config.buffer_limit, 10_000);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.lag, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_defaults() {
        with_env_vars(&[], || {
            assert_eq!(ReaderConfig::from_env().unwrap(), ReaderConfig::default());
        });
    }

    #[test]
    fn test_from_env_custom_values() {
        with_env_vars(
            &[
                ("MURMUR_LIMIT", "5"),
                ("MURMUR_FETCH_SIZE", " 3 "),
                ("MURMUR_BUFFER_LIMIT", "64"),
                ("MURMUR_LAG_MS", "0"),
                ("MURMUR_FETCH_TIMEOUT_MS", "1500"),
                ("MURMUR_FETCH_RETRIES", "0"),
            ],
            || {
                let config = ReaderConfig::from_env().unwrap();
                assert_eq!(config.limit, 5);
                assert_eq!(config.fetch_size, 3);
                assert_eq!(config.buffer_limit, 64);
                assert_eq!(config.lag, Duration::ZERO);
                assert_eq!(config.fetch_timeout, Duration::from_millis(1500));
                assert_eq!(config.fetch_retries, 0);
                assert_eq!(config.tick_interval, Duration::from_secs(1));
            },
        );
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        with_env_vars(&[("MURMUR_FETCH_SIZE", "lots")], || {
            let err = ReaderConfig::from_env().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains("MURMUR_FETCH_SIZE"));
        });
    }

    #[test]
    fn test_from_env_validates() {
        with_env_vars(&[("MURMUR_BUFFER_LIMIT", "0")], || {
            assert!(matches!(ReaderConfig::from_env(), Err(Error::Config(_))));
        });
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = ReaderConfig {
            fetch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReaderConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limit_is_valid() {
        let config = ReaderConfig {
            limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
