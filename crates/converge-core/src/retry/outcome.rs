//! The three-outcome worker contract

/// Result of a single worker invocation
///
/// Exactly one of retry, terminal success or terminal failure holds per
/// invocation. The value travels only with `Success` and the error only with
/// `Failure`, so there is nothing for the engine to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T, E> {
    /// The backend has not converged yet; sleep and invoke again
    Retry,
    /// Terminal success carrying the authoritative result
    Success(T),
    /// Terminal failure; never retried by the engine
    Failure(E),
}

impl<T, E> Outcome<T, E> {
    /// Whether the engine should invoke the worker again
    pub fn is_retry(&self) -> bool {
        matches!(self, Outcome::Retry)
    }

    /// Whether this outcome stops the loop
    pub fn is_terminal(&self) -> bool {
        !self.is_retry()
    }

    /// Build an outcome from a fallible observation
    ///
    /// `Ok(Some(v))` is success, `Ok(None)` asks for a retry and `Err(e)` is
    /// a terminal failure.
    pub fn from_observation(observation: Result<Option<T>, E>) -> Self {
        match observation {
            Ok(Some(value)) => Outcome::Success(value),
            Ok(None) => Outcome::Retry,
            Err(err) => Outcome::Failure(err),
        }
    }

    /// Map the success value
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Retry => Outcome::Retry,
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(err) => Outcome::Failure(err),
        }
    }

    /// Map the failure error
    pub fn map_err<E2, F>(self, f: F) -> Outcome<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Outcome::Retry => Outcome::Retry,
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(err) => Outcome::Failure(f(err)),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}
