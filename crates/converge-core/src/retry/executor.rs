//! Retry loop engine
//!
//! Drives a worker through repeated invocations, sleeping between attempts
//! according to a [`Sleeper`], until the worker reports a terminal outcome
//! or the sleeper refuses another attempt.

use std::fmt;
use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::RetryError;
use super::observer::{RetryObserver, TracingObserver};
use super::outcome::Outcome;
use super::policy::{RetryPolicy, Sleeper};

/// Run `worker` until it converges, using `sleeper` for the schedule
///
/// Convenience wrapper around [`RetryLoop`] with the tracing observer and no
/// cancellation or deadline.
///
/// # Example
///
/// ```rust,no_run
/// use converge_core::retry::{retry_loop, Outcome, RetryError, RetryPolicy};
///
/// async fn example() -> Result<&'static str, RetryError<String>> {
///     retry_loop("ping backend", RetryPolicy::doubling(20, 10), || async {
///         Outcome::Success("pong")
///     })
///     .await
/// }
/// ```
pub async fn retry_loop<S, F, Fut, T, E>(
    description: &str,
    sleeper: S,
    worker: F,
) -> Result<T, RetryError<E>>
where
    S: Sleeper,
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T, E>>,
    E: fmt::Display,
{
    RetryLoop::new(description)
        .with_sleeper(sleeper)
        .run(worker)
        .await
}

/// A configured retry loop
///
/// The loop itself holds no mutable state, so one `RetryLoop` can run any
/// number of workers, one after another or concurrently.
///
/// # Example
///
/// ```rust
/// use converge_core::retry::{RetryLoop, RetryPolicy, StatsObserver};
/// use std::time::Duration;
///
/// let retry = RetryLoop::new("Wait for changes")
///     .with_sleeper(RetryPolicy::doubling(20, 10))
///     .with_observer(StatsObserver::new())
///     .with_deadline(Duration::from_secs(30));
/// assert_eq!(retry.description(), "Wait for changes");
/// ```
pub struct RetryLoop<S = RetryPolicy, O = TracingObserver> {
    description: String,
    sleeper: S,
    observer: O,
    cancellation: Option<CancellationToken>,
    deadline: Option<std::time::Duration>,
}

impl RetryLoop<RetryPolicy, TracingObserver> {
    /// Create a loop with the default policy and the tracing observer
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sleeper: RetryPolicy::default(),
            observer: TracingObserver,
            cancellation: None,
            deadline: None,
        }
    }
}

impl<S, O> RetryLoop<S, O> {
    /// Set the sleeper policy
    pub fn with_sleeper<S2>(self, sleeper: S2) -> RetryLoop<S2, O> {
        RetryLoop {
            description: self.description,
            sleeper,
            observer: self.observer,
            cancellation: self.cancellation,
            deadline: self.deadline,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryLoop<S, O2> {
        RetryLoop {
            description: self.description,
            sleeper: self.sleeper,
            observer,
            cancellation: self.cancellation,
            deadline: self.deadline,
        }
    }

    /// Stop the loop when `token` is cancelled
    ///
    /// Cancellation is observed before each attempt and while sleeping; an
    /// in-flight worker invocation always runs to completion.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Stop the loop once `deadline` has elapsed since it started
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Label used in logs and errors
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The sleeper policy
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }
}

impl<S, O> RetryLoop<S, O>
where
    S: Sleeper,
    O: RetryObserver,
{
    /// Invoke `worker` until it reports a terminal outcome
    ///
    /// Returns the success value, the worker's own error, or a loop error
    /// (exhausted, cancelled, deadline exceeded). Worker errors are never
    /// retried.
    pub async fn run<F, Fut, T, E>(&self, mut worker: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
        E: fmt::Display,
    {
        let start = Instant::now();
        let deadline = self.deadline.map(|limit| start + limit);
        let max_attempts = self.sleeper.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            self.check_interrupted(start, deadline, attempt - 1)?;

            self.observer
                .on_attempt_start(&self.description, attempt, max_attempts);

            match worker().await {
                Outcome::Success(value) => {
                    self.observer
                        .on_success(&self.description, attempt, start.elapsed());
                    return Ok(value);
                }
                Outcome::Failure(err) => {
                    self.observer.on_failure(&self.description, attempt, &err);
                    return Err(RetryError::Worker(err));
                }
                Outcome::Retry => {}
            }

            let Some(delay) = self.sleeper.next_delay(attempt) else {
                self.observer.on_exhausted(&self.description, attempt);
                return Err(RetryError::exhausted(self.description.clone(), attempt));
            };

            self.observer
                .on_retry_scheduled(&self.description, attempt, delay);

            if !delay.is_zero() {
                self.pause(delay, start, deadline, attempt).await?;
            }

            attempt += 1;
        }
    }

    /// Like [`run`](Self::run), for workers whose success may lack a value
    ///
    /// A terminal success carrying `None` becomes
    /// [`RetryError::MissingValue`].
    pub async fn run_required<F, Fut, T, E>(&self, worker: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<Option<T>, E>>,
        E: fmt::Display,
    {
        self.run(worker)
            .await?
            .ok_or_else(|| RetryError::missing_value(self.description.clone()))
    }

    fn check_interrupted<E>(
        &self,
        start: Instant,
        deadline: Option<Instant>,
        attempts: u32,
    ) -> Result<(), RetryError<E>> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            self.observer
                .on_interrupted(&self.description, attempts, "cancelled");
            return Err(RetryError::cancelled(self.description.clone(), attempts));
        }

        if deadline.is_some_and(|at| Instant::now() >= at) {
            self.observer
                .on_interrupted(&self.description, attempts, "deadline");
            return Err(RetryError::deadline_exceeded(
                self.description.clone(),
                attempts,
                start.elapsed(),
            ));
        }

        Ok(())
    }

    async fn pause<E>(
        &self,
        delay: std::time::Duration,
        start: Instant,
        deadline: Option<Instant>,
        attempts: u32,
    ) -> Result<(), RetryError<E>> {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancelled => {
                self.observer
                    .on_interrupted(&self.description, attempts, "cancelled");
                Err(RetryError::cancelled(self.description.clone(), attempts))
            }
            _ = expired => {
                self.observer
                    .on_interrupted(&self.description, attempts, "deadline");
                Err(RetryError::deadline_exceeded(
                    self.description.clone(),
                    attempts,
                    start.elapsed(),
                ))
            }
        }
    }
}
