//! View query polling

use converge_core::retry::{Outcome, RetryLoop, RetryObserver, Sleeper};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{classify, LastStatus, PollResult};
use crate::dispatch::{Authority, DispatchRequest, Dispatcher};
use crate::error::{Error, Result};

/// Retry description used when waiting for view rows
pub fn view_description(expected: usize, path: &str) -> String {
    format!("Wait for {} view results for query to {}", expected, path)
}

/// A view query response: `{"total_rows": n, "rows": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewResult {
    #[serde(default)]
    pub total_rows: u64,
    pub rows: Vec<ViewRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ViewError>,
}

impl PollResult for ViewResult {
    fn result_count(&self) -> usize {
        self.rows.len()
    }
}

/// One view row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// Per-node error reported alongside a view result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewError {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub reason: String,
}

/// Queries a view on the admin surface until it returns at least
/// `expected` rows
#[derive(Debug)]
pub struct ViewWorker {
    dispatcher: Dispatcher,
    expected: usize,
    path: String,
    last_status: LastStatus,
}

impl ViewWorker {
    /// `path` includes the database name, e.g. `/db/_design/foo/_view/bar`
    pub fn new(dispatcher: Dispatcher, expected: usize, path: impl Into<String>) -> Self {
        Self {
            dispatcher,
            expected,
            path: path.into(),
            last_status: LastStatus::default(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Retry description for this query
    pub fn description(&self) -> String {
        view_description(self.expected, &self.path)
    }

    /// Status of the most recent poll, if any
    pub fn last_status(&self) -> Option<u16> {
        self.last_status.get()
    }

    /// One observation of the view
    pub async fn poll(&self) -> Outcome<Option<ViewResult>, Error> {
        let request = DispatchRequest::get(self.path.as_str());

        match self.dispatcher.dispatch(Authority::Admin, request).await {
            Ok(response) => {
                self.last_status.record(response.status_code());
                classify(&response, self.expected)
            }
            Err(err) => Outcome::Failure(err),
        }
    }

    /// Drive this worker through `retry` until it converges
    pub async fn wait<S, O>(&self, retry: &RetryLoop<S, O>) -> Result<ViewResult>
    where
        S: Sleeper,
        O: RetryObserver,
    {
        let result = retry.run_required(|| self.poll()).await?;
        Ok(result)
    }
}
