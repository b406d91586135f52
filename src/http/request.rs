//! Outbound request construction.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the upstream's base address
//! - Prefix the upstream's base path to the inbound path
//! - Put the upstream's static query before the inbound query
//!
//! # Design Decisions
//! - The inbound body is buffered once and replayed per attempt
//! - End-to-end headers are copied; hop-by-hop headers are stripped

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, Request, Uri};
use url::{Position, Url};

use crate::http::forward::ForwardError;
use crate::http::headers::strip_hop_by_hop;

/// Join two URL paths with exactly one slash between them.
pub fn join_url_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Concatenate the upstream query and the inbound query, upstream first.
pub fn join_query(upstream: Option<&str>, inbound: Option<&str>) -> Option<String> {
    let upstream = upstream.filter(|q| !q.is_empty());
    let inbound = inbound.filter(|q| !q.is_empty());
    match (upstream, inbound) {
        (Some(a), Some(b)) => Some(format!("{a}&{b}")),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

/// The URI an inbound request is forwarded to on `base`.
pub fn upstream_uri(base: &Url, inbound: &Uri) -> Result<Uri, ForwardError> {
    let path = join_url_path(base.path(), inbound.path());
    let query = join_query(base.query(), inbound.query())
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let uri = format!(
        "{}://{}{}{}",
        base.scheme(),
        &base[Position::BeforeHost..Position::AfterPort],
        path,
        query
    );
    uri.parse::<Uri>()
        .map_err(|e| ForwardError::InvalidRequest(format!("{uri}: {e}")))
}

/// Build the request sent to `base` for one forwarding attempt.
pub fn build_upstream_request(
    base: &Url,
    inbound: &Parts,
    body: Bytes,
) -> Result<Request<Body>, ForwardError> {
    let uri = upstream_uri(base, &inbound.uri)?;
    let mut request = Request::builder()
        .method(inbound.method.clone())
        .uri(uri)
        .body(Body::from(body))
        .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = inbound.headers.clone();
    strip_hop_by_hop(request.headers_mut());
    Ok(request)
}
