//! Match rule evaluation.
//!
//! # Responsibilities
//! - Match host (exact, case-sensitive)
//! - Match path prefix (byte prefix, case-sensitive, no normalization)
//! - Combine the two conditions of a rule with AND semantics
//!
//! # Design Decisions
//! - Empty condition = always matches (wildcard)
//! - An upstream's rules are combined with OR; zero rules never match
//! - A custom matcher replaces rule evaluation instead of extending it

use axum::http::{header, request::Parts};
use serde::{Deserialize, Serialize};

use crate::load_balancer::upstream::Upstream;

/// A (host, path-prefix) pair. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchRule {
    /// Exact host to match. Empty matches any host.
    pub host: String,
    /// Path prefix to match. Empty matches any path.
    pub path: String,
}

impl MatchRule {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// Rule that only constrains the host.
    pub fn host(host: impl Into<String>) -> Self {
        Self::new(host, "")
    }

    /// Rule that only constrains the path prefix.
    pub fn path(path: impl Into<String>) -> Self {
        Self::new("", path)
    }

    /// Returns true if both the host and the path condition hold.
    pub fn matches(&self, host: &str, path: &str) -> bool {
        host_matches(host, self) && path_matches(path, self)
    }
}

/// True if the rule has no path prefix, or `path` starts with it.
pub fn path_matches(path: &str, rule: &MatchRule) -> bool {
    rule.path.is_empty() || path.starts_with(&rule.path)
}

/// True if the rule has no host, or `host` equals it exactly.
pub fn host_matches(host: &str, rule: &MatchRule) -> bool {
    rule.host.is_empty() || host == rule.host
}

/// The host a request was addressed to.
///
/// Uses the `Host` header, falling back to the URI authority (HTTP/2
/// requests carry it there). Returns an empty string when neither exists.
pub fn request_host(request: &Parts) -> &str {
    request
        .headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri.authority().map(|a| a.as_str()))
        .unwrap_or("")
}

/// Custom eligibility predicate for an upstream.
///
/// When an upstream carries one, its match rules are ignored.
pub trait UpstreamMatcher<T>: Send + Sync {
    fn matches(&self, request: &Parts, upstream: &Upstream<T>) -> bool;
}

impl<T, F> UpstreamMatcher<T> for F
where
    F: Fn(&Parts, &Upstream<T>) -> bool + Send + Sync,
{
    fn matches(&self, request: &Parts, upstream: &Upstream<T>) -> bool {
        self(request, upstream)
    }
}
