//! Error types for converge-rest

use converge_core::retry::RetryError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using converge-rest's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Dispatch, parsing and polling errors
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be turned into a valid HTTP request
    #[error("Invalid request {method} {path}: {message}")]
    InvalidRequest {
        method: String,
        path: String,
        message: String,
    },

    /// The handler answered with a status the caller did not accept
    #[error("Response status {status} (expected {expected}) for {method} <{uri}> : {body}")]
    UnexpectedStatus {
        method: String,
        uri: String,
        status: u16,
        expected: String,
        body: String,
    },

    /// The response body is not the JSON shape the caller expected
    #[error("Malformed JSON body for {method} <{uri}> (status {status}): {source}")]
    MalformedBody {
        method: String,
        uri: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// Reading the response body failed
    #[error("Failed to read response body for {method} <{uri}>: {source}")]
    Body {
        method: String,
        uri: String,
        #[source]
        source: axum::Error,
    },

    /// The backend collaborator reported an error
    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),

    /// Harness configuration error
    #[error(transparent)]
    Config(#[from] converge_core::Error),

    /// The attempt budget ran out before the backend converged
    #[error("retry attempts exceeded for '{description}' after {attempts} attempts")]
    RetryExhausted { description: String, attempts: u32 },

    /// A polling loop succeeded without producing a value
    #[error("no value produced by '{description}'")]
    MissingValue { description: String },

    /// A polling loop was cancelled
    #[error("'{description}' cancelled after {attempts} attempts")]
    Cancelled { description: String, attempts: u32 },

    /// A polling loop hit its wall-clock deadline
    #[error("'{description}' hit its deadline after {attempts} attempts ({elapsed:?})")]
    DeadlineExceeded {
        description: String,
        attempts: u32,
        elapsed: Duration,
    },
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(
        method: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRequest {
            method: method.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Status code observed by the dispatch that failed, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::UnexpectedStatus { status, .. } | Error::MalformedBody { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Check if the polling attempt budget was exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::RetryExhausted { .. })
    }

    /// Check if a polling loop succeeded without a value
    pub fn is_missing_value(&self) -> bool {
        matches!(self, Error::MissingValue { .. })
    }
}

impl From<RetryError<Error>> for Error {
    fn from(err: RetryError<Error>) -> Self {
        match err {
            RetryError::Worker(err) => err,
            RetryError::Exhausted {
                description,
                attempts,
            } => Error::RetryExhausted {
                description,
                attempts,
            },
            RetryError::MissingValue { description } => Error::MissingValue { description },
            RetryError::Cancelled {
                description,
                attempts,
            } => Error::Cancelled {
                description,
                attempts,
            },
            RetryError::DeadlineExceeded {
                description,
                attempts,
                elapsed,
            } => Error::DeadlineExceeded {
                description,
                attempts,
                elapsed,
            },
        }
    }
}
