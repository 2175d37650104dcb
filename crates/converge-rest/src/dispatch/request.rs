//! Dispatch requests and identities

use axum::http::{HeaderValue, Method};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

/// Basic-auth identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Identity {
    /// Create a new identity
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value for this identity
    pub fn authorization_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    /// Parse a `Basic` `Authorization` header value
    ///
    /// Returns `None` for other schemes or malformed credentials. Useful for
    /// handlers that authenticate public requests.
    pub fn from_authorization(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?;
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }
}

/// A request to dispatch through one of the two authorities
///
/// Headers are kept as strings and validated when the request is built, so
/// the builder methods never fail.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) identity: Option<Identity>,
}

impl DispatchRequest {
    /// Create a request with an empty body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Bytes::new(),
            headers: Vec::new(),
            identity: None,
        }
    }

    /// `GET` request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `PUT` request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `POST` request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE` request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing an earlier value with the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set several headers
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.with_header(name, value))
    }

    /// Attach a basic-auth identity
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, as given
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attached identity, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}
