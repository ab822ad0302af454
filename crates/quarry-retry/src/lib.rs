//! Retry with exponential backoff, as an injectable policy.
//!
//! A [`Retry`] is either *disabled* (run the operation exactly once) or an exponential backoff
//! policy: after each failure it sleeps for the current delay with ±30% multiplicative jitter,
//! doubles the delay up to a ceiling and tries again. The error of the final attempt is
//! returned unchanged.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const JITTER: f64 = 0.3;

const DEFAULT_INITIAL_DELAY_MS: i64 = 1_000;
const DEFAULT_BACKOFF_LIMIT_MS: i64 = 5_000;
const DEFAULT_MAX_ATTEMPTS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryConfigError {
    #[error("invalid argument: {name} must be positive, got {value}")]
    InvalidArgument { name: &'static str, value: i64 },
}

/// The backoff sleep was interrupted; retrying stops immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interrupted while waiting to retry {operation}")]
pub struct Interrupted {
    pub operation: String,
}

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        std::thread::sleep(duration);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// When `false`, every operation runs exactly once.
    #[serde(default = "RetryConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RetryConfig::default_initial_delay_ms")]
    pub initial_delay_ms: i64,
    #[serde(default = "RetryConfig::default_backoff_limit_ms")]
    pub backoff_limit_ms: i64,
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: i64,
}

impl RetryConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_initial_delay_ms() -> i64 {
        DEFAULT_INITIAL_DELAY_MS
    }

    fn default_backoff_limit_ms() -> i64 {
        DEFAULT_BACKOFF_LIMIT_MS
    }

    fn default_max_attempts() -> i64 {
        DEFAULT_MAX_ATTEMPTS
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            initial_delay_ms: Self::default_initial_delay_ms(),
            backoff_limit_ms: Self::default_backoff_limit_ms(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    backoff_limit: Duration,
    max_attempts: u32,
}

impl ExponentialBackoff {
    /// The backoff described by [`RetryConfig::default`].
    pub const STANDARD: Self = Self {
        initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS as u64),
        backoff_limit: Duration::from_millis(DEFAULT_BACKOFF_LIMIT_MS as u64),
        max_attempts: DEFAULT_MAX_ATTEMPTS as u32,
    };

    pub fn new(
        initial_delay_ms: i64,
        backoff_limit_ms: i64,
        max_attempts: i64,
    ) -> Result<Self, RetryConfigError> {
        let positive = |name: &'static str, value: i64| {
            if value > 0 {
                Ok(value)
            } else {
                Err(RetryConfigError::InvalidArgument { name, value })
            }
        };
        let initial_delay_ms = positive("initialDelayMs", initial_delay_ms)?;
        let backoff_limit_ms = positive("backoffLimitMs", backoff_limit_ms)?;
        let max_attempts = positive("maxAttempts", max_attempts)?;

        Ok(Self {
            initial_delay: Duration::from_millis(initial_delay_ms as u64),
            backoff_limit: Duration::from_millis(backoff_limit_ms as u64),
            max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
        })
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn backoff_limit(&self) -> Duration {
        self.backoff_limit
    }

    /// Base (un-jittered) delay that follows `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.backoff_limit)
    }
}

/// Retry policy handed to the call sites that perform fallible I/O.
#[derive(Clone)]
pub struct Retry {
    backoff: Option<ExponentialBackoff>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Retry {
    /// Run each operation exactly once, propagating any failure immediately.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backoff: None,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Exponential backoff with the default settings: 1s initial delay, 5s ceiling and
    /// 3 attempts.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            backoff: Some(ExponentialBackoff::STANDARD),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn exponential_backoff(
        initial_delay_ms: i64,
        backoff_limit_ms: i64,
        max_attempts: i64,
    ) -> Result<Self, RetryConfigError> {
        Ok(Self {
            backoff: Some(ExponentialBackoff::new(
                initial_delay_ms,
                backoff_limit_ms,
                max_attempts,
            )?),
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, RetryConfigError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        Self::exponential_backoff(
            config.initial_delay_ms,
            config.backoff_limit_ms,
            config.max_attempts,
        )
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn backoff(&self) -> Option<&ExponentialBackoff> {
        self.backoff.as_ref()
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.backoff.map_or(1, |backoff| backoff.max_attempts)
    }

    /// Run `op`, retrying every failure.
    pub fn retry<T, E>(&self, name: &str, op: impl FnMut() -> Result<T, E>) -> Result<T, E>
    where
        E: fmt::Display + From<Interrupted>,
    {
        self.retry_when(name, op, |_| true)
    }

    /// Run `op`, retrying only failures accepted by `should_retry`.
    ///
    /// Rejected failures are returned as-is without sleeping.
    pub fn retry_when<T, E>(
        &self,
        name: &str,
        mut op: impl FnMut() -> Result<T, E>,
        should_retry: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        E: fmt::Display + From<Interrupted>,
    {
        let Some(backoff) = self.backoff else {
            return op();
        };

        let mut delay = backoff.initial_delay;
        let mut attempt = 1u32;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= backoff.max_attempts || !should_retry(&err) {
                return Err(err);
            }

            let jittered = jitter(delay);
            tracing::warn!(
                target = "quarry.retry",
                operation = name,
                attempt,
                max_attempts = backoff.max_attempts,
                delay_ms = jittered.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            self.sleeper.sleep(jittered).map_err(|mut interrupted| {
                if interrupted.operation.is_empty() {
                    interrupted.operation = name.to_string();
                }
                E::from(interrupted)
            })?;

            delay = backoff.next_delay(delay);
            attempt += 1;
        }
    }
}

fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
    delay.mul_f64(factor)
}
