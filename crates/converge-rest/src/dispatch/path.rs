//! Request path normalization
//!
//! Resource identifiers may contain percent-encoded slashes (`%2F`). They
//! must reach the router still encoded so the identifier stays a single
//! path segment. Normalization makes the encoding canonical and escapes
//! bytes that are not allowed in a URI path, without decoding anything.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Bytes escaped in paths and query strings
///
/// Everything outside the unreserved, sub-delim and `:@/?%` characters.
/// `%` stays literal so existing escapes pass through untouched.
const INVALID_URI: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Normalize a resource path (optionally with a query string)
///
/// - a leading `/` is added when missing
/// - `%2f` in the path is rewritten to `%2F`
/// - bytes outside the URI path character set are percent-encoded
///
/// The query string is left untouched apart from escaping invalid bytes.
pub fn normalize_path(resource: &str) -> String {
    let (path, query) = match resource.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (resource, None),
    };

    let mut normalized = String::with_capacity(resource.len() + 1);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    let escaped = utf8_percent_encode(path, INVALID_URI).to_string();
    normalized.push_str(&escaped.replace("%2f", "%2F"));

    if let Some(query) = query {
        normalized.push('?');
        normalized.extend(utf8_percent_encode(query, INVALID_URI));
    }
    normalized
}

/// Whether the path part of `resource` carries an encoded slash
pub(crate) fn has_quoted_slash(resource: &str) -> bool {
    let path = resource.split('?').next().unwrap_or_default();
    path.contains("%2f") || path.contains("%2F")
}
