//! Sleeper policies: backoff schedule and attempt budget
//!
//! A sleeper answers one question per failed attempt: how long to wait before
//! the next attempt, or whether to stop altogether. Sleepers are pure
//! functions of the attempt number, so one policy value can be shared by any
//! number of concurrent retry loops.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schedule governing inter-attempt delay and attempt budget
pub trait Sleeper: Send + Sync {
    /// Delay to wait after `attempt` (1-indexed) requested a retry
    ///
    /// Returns `None` once the attempt budget is spent.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Total number of attempts permitted, if known
    fn max_attempts(&self) -> Option<u32> {
        None
    }
}

impl<F> Sleeper for F
where
    F: Fn(u32) -> Option<Duration> + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self(attempt)
    }
}

/// Backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,

    /// Fixed delay between attempts
    FixedDelay,

    /// Delay multiplied by the backoff multiplier after every attempt (default)
    #[default]
    ExponentialBackoff,

    /// Delay grows by the initial delay after every attempt
    LinearBackoff,
}

/// Retry policy: attempt budget plus backoff schedule
///
/// The budget counts attempts, not elapsed time. Callers that need a
/// wall-clock limit layer it on top with `RetryLoop::with_deadline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of worker invocations
    ///
    /// The worker always runs at least once, so `0` behaves like `1`.
    /// [`crate::config::ConfigLoader`] rejects `0` in loaded configuration.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Multiplier for exponential backoff
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Delay after the first attempt, in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Add up to 25% random variation to each delay
    ///
    /// See [`RetryPolicy::with_jitter`] for what this gives up.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    20
}
fn default_max_delay() -> u64 {
    30_000
}

impl RetryPolicy {
    /// Doubling schedule starting at `initial_delay_ms` with `max_attempts` attempts
    pub fn doubling(initial_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::ExponentialBackoff,
            backoff_multiplier: 2.0,
            initial_delay_ms,
            max_delay_ms: u64::MAX,
            jitter: false,
        }
    }

    /// Constant delay between `max_attempts` attempts
    pub fn fixed(delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::FixedDelay,
            initial_delay_ms: delay_ms,
            ..Self::default()
        }
    }

    /// Set the per-delay cap
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Enable or disable jitter
    ///
    /// With jitter on, the delay is no longer a pure function of the
    /// attempt number, and consecutive delays may decrease. The doubling
    /// and non-decreasing guarantees only hold with jitter off (the
    /// default).
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Sleeper for RetryPolicy {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(calculate_delay(self, attempt, self.jitter))
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.max_attempts)
    }
}

/// Calculate the delay that follows `attempt` (1-indexed)
///
/// ```rust
/// use converge_core::retry::{calculate_delay, RetryPolicy};
///
/// let policy = RetryPolicy::doubling(20, 10);
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 20);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 40);
/// assert_eq!(calculate_delay(&policy, 3, false).as_millis(), 80);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,

        RetryStrategy::FixedDelay => policy.initial_delay_ms,

        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            let delay = policy.initial_delay_ms as f64 * multiplier;
            if delay >= u64::MAX as f64 {
                u64::MAX
            } else {
                delay as u64
            }
        }

        RetryStrategy::LinearBackoff => policy
            .initial_delay_ms
            .saturating_mul(attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        let jitter_value = rand::rng().random_range(0..=jitter_range);
        capped_delay_ms.saturating_add(jitter_value)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}
