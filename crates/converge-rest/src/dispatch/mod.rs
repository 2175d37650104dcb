//! Dual-authority in-process dispatch
//!
//! Requests are routed to one of two handler entry points, the privileged
//! admin surface or the restricted public surface, without opening a
//! socket. The handler sees a complete HTTP request (synthetic origin,
//! `Host` header, headers, basic auth, body) and the full response is
//! captured for inspection.

mod path;
mod request;
mod response;

pub use path::normalize_path;

use path::has_quoted_slash;
pub use request::{DispatchRequest, Identity};
pub use response::DispatchResponse;

use std::fmt;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::{HeaderName, HeaderValue, Request, Uri};
use axum::Router;
use tower::ServiceExt;

use crate::error::{Error, Result};

/// Default synthetic origin
pub const DEFAULT_BASE_ORIGIN: &str = "http://localhost";

/// Privilege level a request is routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    /// Administrative surface; no credentials required
    Admin,
    /// Public surface; may carry a basic-auth identity
    Public,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Admin => write!(f, "admin"),
            Authority::Public => write!(f, "public"),
        }
    }
}

/// Routes requests to the handler bound to each authority
///
/// Cloning is cheap; the routers are shared. The dispatcher keeps no state
/// between calls.
#[derive(Clone)]
pub struct Dispatcher {
    admin: Router,
    public: Router,
    base_origin: String,
}

impl Dispatcher {
    /// Create a dispatcher from the two handler entry points
    pub fn new(admin: Router, public: Router) -> Self {
        Self {
            admin,
            public,
            base_origin: DEFAULT_BASE_ORIGIN.to_string(),
        }
    }

    /// Use a different synthetic origin
    pub fn with_base_origin(mut self, base_origin: impl Into<String>) -> Self {
        self.base_origin = base_origin.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthetic origin prepended to request paths
    pub fn base_origin(&self) -> &str {
        &self.base_origin
    }

    /// Handler bound to `authority`
    pub fn handler(&self, authority: Authority) -> &Router {
        match authority {
            Authority::Admin => &self.admin,
            Authority::Public => &self.public,
        }
    }

    /// Dispatch `request` through `authority` and capture the response
    ///
    /// Any status is returned as a response; only request construction and
    /// body collection failures are errors.
    pub async fn dispatch(
        &self,
        authority: Authority,
        request: DispatchRequest,
    ) -> Result<DispatchResponse> {
        let http_request = self.build_request(&request)?;
        let uri = http_request.uri().clone();

        tracing::debug!(
            authority = %authority,
            method = %request.method,
            uri = %uri,
            quoted_slash = has_quoted_slash(&request.path),
            "dispatching request"
        );

        let response = match self.handler(authority).clone().oneshot(http_request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|source| Error::Body {
                method: request.method.to_string(),
                uri: uri.to_string(),
                source,
            })?;

        tracing::debug!(
            authority = %authority,
            method = %request.method,
            uri = %uri,
            status = parts.status.as_u16(),
            "dispatch complete"
        );

        Ok(DispatchResponse {
            authority,
            method: request.method,
            uri,
            request_body: request.body,
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    fn build_request(&self, request: &DispatchRequest) -> Result<Request<Body>> {
        let invalid = |message: String| {
            Error::invalid_request(request.method.as_str(), request.path.as_str(), message)
        };

        let target = format!("{}{}", self.base_origin, normalize_path(&request.path));
        let uri: Uri = target
            .parse()
            .map_err(|e| invalid(format!("invalid URI {}: {}", target, e)))?;

        let mut http_request = Request::builder()
            .method(request.method.clone())
            .uri(uri.clone())
            .body(Body::from(request.body.clone()))
            .map_err(|e| invalid(e.to_string()))?;

        let headers = http_request.headers_mut();
        if let Some(host) = uri.authority() {
            let host = HeaderValue::from_str(host.as_str())
                .map_err(|e| invalid(format!("invalid host: {}", e)))?;
            headers.insert(HOST, host);
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        if let Some(identity) = &request.identity {
            let value = HeaderValue::from_str(&identity.authorization_value())
                .map_err(|e| invalid(format!("invalid credentials: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(http_request)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_origin", &self.base_origin)
            .finish_non_exhaustive()
    }
}
