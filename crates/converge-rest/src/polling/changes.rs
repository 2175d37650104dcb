//! Change-feed polling

use converge_core::retry::{Outcome, RetryLoop, RetryObserver, Sleeper};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{classify, LastStatus, PollResult};
use crate::dispatch::{Authority, DispatchRequest, Dispatcher, Identity};
use crate::error::{Error, Result};

/// Retry description used when waiting for change-feed entries
pub const CHANGES_DESCRIPTION: &str = "Wait for changes";

/// A change-feed response: `{"results": [...], "last_seq": ...}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangesResults {
    pub results: Vec<ChangeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<Value>,
}

impl PollResult for ChangesResults {
    fn result_count(&self) -> usize {
        self.results.len()
    }
}

/// One change-feed entry
///
/// Sequences are kept as raw JSON since backends report them either as
/// numbers or as compound strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(default)]
    pub seq: Value,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
    #[serde(default)]
    pub changes: Vec<ChangeRevision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// Revision listed in a change entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRevision {
    #[serde(default)]
    pub rev: String,
}

/// Polls a change feed on the public surface until it lists at least
/// `expected` entries
///
/// Each [`poll`](Self::poll) makes exactly one request. The worker never
/// mutates the backend, so it can be invoked any number of times.
#[derive(Debug)]
pub struct ChangesWorker {
    dispatcher: Dispatcher,
    expected: usize,
    url: String,
    identity: Option<Identity>,
    last_status: LastStatus,
}

impl ChangesWorker {
    /// Create a worker; with no identity the feed is read as the guest user
    pub fn new(
        dispatcher: Dispatcher,
        expected: usize,
        url: impl Into<String>,
        identity: Option<Identity>,
    ) -> Self {
        Self {
            dispatcher,
            expected,
            url: url.into(),
            identity,
            last_status: LastStatus::default(),
        }
    }

    /// Number of entries required for success
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Change-feed URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Status of the most recent poll, if any
    pub fn last_status(&self) -> Option<u16> {
        self.last_status.get()
    }

    /// One observation of the change feed
    pub async fn poll(&self) -> Outcome<Option<ChangesResults>, Error> {
        let mut request = DispatchRequest::get(self.url.as_str());
        if let Some(identity) = &self.identity {
            request = request.with_identity(identity.clone());
        }

        match self.dispatcher.dispatch(Authority::Public, request).await {
            Ok(response) => {
                self.last_status.record(response.status_code());
                classify(&response, self.expected)
            }
            Err(err) => Outcome::Failure(err),
        }
    }

    /// Drive this worker through `retry` until it converges
    pub async fn wait<S, O>(&self, retry: &RetryLoop<S, O>) -> Result<ChangesResults>
    where
        S: Sleeper,
        O: RetryObserver,
    {
        let changes = retry.run_required(|| self.poll()).await?;
        Ok(changes)
    }
}
