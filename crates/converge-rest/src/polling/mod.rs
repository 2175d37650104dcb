//! Polling assertions
//!
//! Workers that perform one observation per invocation (one dispatch, one
//! parse) and classify it for the retry loop:
//! - a non-2xx status or a body of the wrong shape is a terminal failure
//! - fewer results than expected asks for another attempt
//! - otherwise the parsed payload is the terminal success value
//!
//! A JSON `null` body parses to no value at all, which the loop reports as
//! a missing value rather than success.

mod changes;
mod view;

pub use changes::{ChangeEntry, ChangeRevision, ChangesResults, ChangesWorker, CHANGES_DESCRIPTION};
pub use view::{view_description, ViewError, ViewResult, ViewRow, ViewWorker};

use std::sync::atomic::{AtomicU16, Ordering};

use converge_core::retry::Outcome;
use serde::de::DeserializeOwned;

use crate::dispatch::DispatchResponse;
use crate::error::Error;

/// A parsed polling payload that can be counted
pub trait PollResult: DeserializeOwned {
    /// Number of results the payload carries
    fn result_count(&self) -> usize;
}

/// Classify one observation
pub fn classify<T: PollResult>(
    response: &DispatchResponse,
    expected: usize,
) -> Outcome<Option<T>, Error> {
    if !response.is_success() {
        return Outcome::Failure(response.status_error("2xx"));
    }

    match response.json::<Option<T>>() {
        Ok(Some(result)) if result.result_count() < expected => {
            tracing::debug!(
                uri = %response.uri(),
                found = result.result_count(),
                expected,
                "not enough results yet"
            );
            Outcome::Retry
        }
        Ok(result) => Outcome::Success(result),
        Err(err) => Outcome::Failure(err),
    }
}

/// Status of the most recent dispatch made by a worker
#[derive(Debug, Default)]
pub(crate) struct LastStatus(AtomicU16);

impl LastStatus {
    pub(crate) fn record(&self, status: u16) {
        self.0.store(status, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> Option<u16> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            status => Some(status),
        }
    }
}
