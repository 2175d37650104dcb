//! Hooks into the retry loop
//!
//! Observers see every attempt, sleep and terminal outcome. The loop uses
//! [`TracingObserver`] unless told otherwise; tests count events with
//! [`StatsObserver`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Observer trait for retry loop events
///
/// Every callback receives the loop description so one observer can watch
/// several loops.
pub trait RetryObserver: Send + Sync {
    /// Called right before the worker is invoked
    ///
    /// # Arguments
    ///
    /// * `description` - Label of the retry loop
    /// * `attempt` - The attempt number (1-indexed)
    /// * `max_attempts` - The attempt budget, if the sleeper reports one
    fn on_attempt_start(&self, description: &str, attempt: u32, max_attempts: Option<u32>);

    /// Called when the worker asked for a retry and the loop is about to sleep
    fn on_retry_scheduled(&self, description: &str, attempt: u32, delay: Duration);

    /// Called when the worker reports terminal success
    fn on_success(&self, description: &str, attempt: u32, total_duration: Duration);

    /// Called when the worker reports a terminal failure
    fn on_failure(&self, description: &str, attempt: u32, error: &dyn fmt::Display);

    /// Called when the sleeper refuses further attempts
    fn on_exhausted(&self, description: &str, attempts: u32);

    /// Called when cancellation or the deadline stops the loop
    fn on_interrupted(&self, description: &str, attempts: u32, reason: &str) {
        let _ = (description, attempts, reason);
    }
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _description: &str, _attempt: u32, _max_attempts: Option<u32>) {}

    fn on_retry_scheduled(&self, _description: &str, _attempt: u32, _delay: Duration) {}

    fn on_success(&self, _description: &str, _attempt: u32, _total_duration: Duration) {}

    fn on_failure(&self, _description: &str, _attempt: u32, _error: &dyn fmt::Display) {}

    fn on_exhausted(&self, _description: &str, _attempts: u32) {}
}

/// Emits one `tracing` event per loop event
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_retry_scheduled`: DEBUG
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_failure`: WARN
/// - `on_exhausted`: ERROR
/// - `on_interrupted`: WARN
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, description: &str, attempt: u32, max_attempts: Option<u32>) {
        tracing::debug!(
            operation = %description,
            attempt = attempt,
            max_attempts = ?max_attempts,
            "starting attempt"
        );
    }

    fn on_retry_scheduled(&self, description: &str, attempt: u32, delay: Duration) {
        tracing::debug!(
            operation = %description,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "not converged yet, will retry"
        );
    }

    fn on_success(&self, description: &str, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %description,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "converged after retry"
            );
        } else {
            tracing::debug!(
                operation = %description,
                duration_ms = total_duration.as_millis() as u64,
                "converged on first attempt"
            );
        }
    }

    fn on_failure(&self, description: &str, attempt: u32, error: &dyn fmt::Display) {
        tracing::warn!(
            operation = %description,
            attempt = attempt,
            error = %error,
            "worker reported a terminal error"
        );
    }

    fn on_exhausted(&self, description: &str, attempts: u32) {
        tracing::error!(
            operation = %description,
            attempts = attempts,
            "backend did not converge within the attempt budget"
        );
    }

    fn on_interrupted(&self, description: &str, attempts: u32, reason: &str) {
        tracing::warn!(
            operation = %description,
            attempts = attempts,
            reason = reason,
            "retry loop interrupted"
        );
    }
}

/// An observer that counts retry events
///
/// `retries_scheduled` equals the number of sleeps the loop performed.
#[derive(Debug, Default)]
pub struct StatsObserver {
    pub attempt_starts: AtomicU32,
    pub retries_scheduled: AtomicU32,
    pub successes: AtomicU32,
    pub failures: AtomicU32,
    pub exhaustions: AtomicU32,
    /// Cancellations and deadline hits
    pub interruptions: AtomicU32,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker invocations started
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Sleeps between attempts
    pub fn retries_scheduled(&self) -> u32 {
        self.retries_scheduled.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn interruptions(&self) -> u32 {
        self.interruptions.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _description: &str, _attempt: u32, _max_attempts: Option<u32>) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry_scheduled(&self, _description: &str, _attempt: u32, _delay: Duration) {
        self.retries_scheduled.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _description: &str, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _description: &str, _attempt: u32, _error: &dyn fmt::Display) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _description: &str, _attempts: u32) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interrupted(&self, _description: &str, _attempts: u32, _reason: &str) {
        self.interruptions.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, description: &str, attempt: u32, max_attempts: Option<u32>) {
        (**self).on_attempt_start(description, attempt, max_attempts)
    }

    fn on_retry_scheduled(&self, description: &str, attempt: u32, delay: Duration) {
        (**self).on_retry_scheduled(description, attempt, delay)
    }

    fn on_success(&self, description: &str, attempt: u32, total_duration: Duration) {
        (**self).on_success(description, attempt, total_duration)
    }

    fn on_failure(&self, description: &str, attempt: u32, error: &dyn fmt::Display) {
        (**self).on_failure(description, attempt, error)
    }

    fn on_exhausted(&self, description: &str, attempts: u32) {
        (**self).on_exhausted(description, attempts)
    }

    fn on_interrupted(&self, description: &str, attempts: u32, reason: &str) {
        (**self).on_interrupted(description, attempts, reason)
    }
}
