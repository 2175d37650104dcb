//! Terminal errors produced by the retry loop
//!
//! The error type is generic over `E`, the error a worker reports through
//! `Outcome::Failure`. That error is carried unchanged in `Worker`.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors that end a retry loop
#[derive(Debug)]
pub enum RetryError<E> {
    /// The worker reported a terminal failure
    Worker(E),

    /// The sleeper policy ran out of attempts while the worker kept asking
    /// for a retry
    Exhausted {
        /// Label of the retry loop
        description: String,
        /// Number of worker invocations made
        attempts: u32,
    },

    /// The loop ended in success without producing a value
    ///
    /// This is a worker contract violation, not an eventual-consistency
    /// failure.
    MissingValue {
        /// Label of the retry loop
        description: String,
    },

    /// The loop was cancelled through its cancellation token
    Cancelled {
        /// Label of the retry loop
        description: String,
        /// Number of worker invocations made before cancellation
        attempts: u32,
    },

    /// The wall-clock deadline passed before a terminal outcome
    DeadlineExceeded {
        /// Label of the retry loop
        description: String,
        /// Number of worker invocations made
        attempts: u32,
        /// Time spent in the loop
        elapsed: Duration,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Worker(err) => write!(f, "{}", err),
            RetryError::Exhausted {
                description,
                attempts,
            } => write!(
                f,
                "retry attempts exceeded for '{}' after {} attempts",
                description, attempts
            ),
            RetryError::MissingValue { description } => {
                write!(f, "retry loop '{}' succeeded without a value", description)
            }
            RetryError::Cancelled {
                description,
                attempts,
            } => write!(
                f,
                "retry loop '{}' cancelled after {} attempts",
                description, attempts
            ),
            RetryError::DeadlineExceeded {
                description,
                attempts,
                elapsed,
            } => write!(
                f,
                "retry loop '{}' hit its deadline after {} attempts over {:.2}s",
                description,
                attempts,
                elapsed.as_secs_f64()
            ),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Worker(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Create a new exhausted error
    pub fn exhausted(description: impl Into<String>, attempts: u32) -> Self {
        RetryError::Exhausted {
            description: description.into(),
            attempts,
        }
    }

    /// Create a new missing value error
    pub fn missing_value(description: impl Into<String>) -> Self {
        RetryError::MissingValue {
            description: description.into(),
        }
    }

    /// Create a new cancelled error
    pub fn cancelled(description: impl Into<String>, attempts: u32) -> Self {
        RetryError::Cancelled {
            description: description.into(),
            attempts,
        }
    }

    /// Create a new deadline error
    pub fn deadline_exceeded(
        description: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        RetryError::DeadlineExceeded {
            description: description.into(),
            attempts,
            elapsed,
        }
    }

    /// Check if the attempt budget was exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if the worker reported the failure
    pub fn is_worker(&self) -> bool {
        matches!(self, RetryError::Worker(_))
    }

    /// Check if the loop succeeded without a value
    pub fn is_missing_value(&self) -> bool {
        matches!(self, RetryError::MissingValue { .. })
    }

    /// Check if the loop was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Check if the deadline passed
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, RetryError::DeadlineExceeded { .. })
    }

    /// Get the worker error, consuming this error
    pub fn into_worker_error(self) -> Option<E> {
        match self {
            RetryError::Worker(err) => Some(err),
            _ => None,
        }
    }

    /// Map the worker error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Worker(err) => RetryError::Worker(f(err)),
            RetryError::Exhausted {
                description,
                attempts,
            } => RetryError::Exhausted {
                description,
                attempts,
            },
            RetryError::MissingValue { description } => RetryError::MissingValue { description },
            RetryError::Cancelled {
                description,
                attempts,
            } => RetryError::Cancelled {
                description,
                attempts,
            },
            RetryError::DeadlineExceeded {
                description,
                attempts,
                elapsed,
            } => RetryError::DeadlineExceeded {
                description,
                attempts,
                elapsed,
            },
        }
    }
}
