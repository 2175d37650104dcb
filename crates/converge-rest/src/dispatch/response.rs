//! Captured dispatch responses

use std::borrow::Cow;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::Authority;
use crate::error::{Error, Result};

/// Status line, headers and body captured from one dispatch, plus the
/// request context needed for diagnostics
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub(crate) authority: Authority,
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) request_body: Bytes,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl DispatchResponse {
    /// Authority the request was routed through
    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request URI, including the synthetic origin
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request body as sent
    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response status as a number
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A response header as text, if present and valid
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Raw response body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Response body as text (lossy)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|source| Error::MalformedBody {
            method: self.method.to_string(),
            uri: self.uri.to_string(),
            status: self.status_code(),
            source,
        })
    }

    /// Fail with request context unless the status is `expected`
    pub fn assert_status(&self, expected: u16) -> Result<&Self> {
        if self.status_code() == expected {
            Ok(self)
        } else {
            Err(self.status_error(expected.to_string()))
        }
    }

    /// Fail with request context unless the status is 2xx
    pub fn assert_success(&self) -> Result<&Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.status_error("2xx"))
        }
    }

    /// Log the body at info level
    pub fn dump_body(&self) {
        tracing::info!(
            method = %self.method,
            uri = %self.uri,
            status = self.status_code(),
            "{}",
            self.text()
        );
    }

    pub(crate) fn status_error(&self, expected: impl Into<String>) -> Error {
        Error::UnexpectedStatus {
            method: self.method.to_string(),
            uri: self.uri.to_string(),
            status: self.status_code(),
            expected: expected.into(),
            body: self.text().into_owned(),
        }
    }
}
