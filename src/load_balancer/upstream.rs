//! Upstream abstraction.
//!
//! # Responsibilities
//! - Represent a single backend target (base URL, match rules, metadata)
//! - Gate eligibility on the health flag
//! - Track running metrics (last request, EWMA latency, totals)
//!
//! # Design Decisions
//! - Every mutable field is an independent atomic with `Relaxed` ordering
//! - No cross-field atomicity: concurrent EWMA updates may lose a sample and
//!   concurrent health flips are last-writer-wins
//! - Two upstreams are the same target iff scheme and host[:port] match

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;
use tokio::time::Instant;
use url::{Position, Url};

use crate::health::state::HealthState;
use crate::routing::matcher::{request_host, MatchRule, UpstreamMatcher};

/// Smoothing factor of the latency EWMA, as a fraction (alpha = 1/10).
const EWMA_ALPHA_NUM: u128 = 1;
const EWMA_ALPHA_DEN: u128 = 10;

/// Folds a latency sample into a running average.
///
/// `avg' = 0.1 * sample + 0.9 * avg`, computed in integer nanoseconds so the
/// result is exact for whole-nanosecond inputs.
pub fn ewma(average: Duration, sample: Duration) -> Duration {
    let next = (EWMA_ALPHA_NUM * sample.as_nanos()
        + (EWMA_ALPHA_DEN - EWMA_ALPHA_NUM) * average.as_nanos())
        / EWMA_ALPHA_DEN;
    Duration::from_nanos(u64::try_from(next).unwrap_or(u64::MAX))
}

/// Identity of an upstream target: `scheme://host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamKey(String);

impl UpstreamKey {
    pub fn from_url(url: &Url) -> Self {
        Self(format!(
            "{}://{}",
            url.scheme(),
            &url[Position::BeforeHost..Position::AfterPort]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single backend target.
///
/// `T` is caller-defined metadata; it is stored and handed back, never
/// inspected.
pub struct Upstream<T = ()> {
    id: Option<String>,
    url: Url,
    key: UpstreamKey,
    rules: Vec<MatchRule>,
    matcher: Option<Arc<dyn UpstreamMatcher<T>>>,
    metadata: T,

    healthy: AtomicBool,
    /// Reference point for `last_request_nanos`.
    epoch: Instant,
    last_request_nanos: AtomicU64,
    average_response_nanos: AtomicU64,
    total_requests: AtomicU64,
    total_error_responses: AtomicU64,
}

impl<T> Upstream<T> {
    /// Create an upstream for `url` carrying `metadata`. It starts healthy
    /// and with no match rules.
    pub fn new(url: Url, metadata: T) -> Self {
        Self {
            id: None,
            key: UpstreamKey::from_url(&url),
            url,
            rules: Vec::new(),
            matcher: None,
            metadata,
            healthy: AtomicBool::new(true),
            epoch: Instant::now(),
            last_request_nanos: AtomicU64::new(0),
            average_response_nanos: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_error_responses: AtomicU64::new(0),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = MatchRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Install a custom matcher. Match rules are ignored from then on.
    pub fn with_matcher(mut self, matcher: impl UpstreamMatcher<T> + 'static) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn key(&self) -> &UpstreamKey {
        &self.key
    }

    /// `host[:port]` of the target, as reported in metrics.
    pub fn host(&self) -> &str {
        &self.url[Position::BeforeHost..Position::AfterPort]
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn metadata(&self) -> &T {
        &self.metadata
    }

    /// Returns true if both upstreams point at the same scheme and host.
    pub fn is_same(&self, other: &Upstream<T>) -> bool {
        self.key == other.key
    }

    // --- Health ---

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn health_state(&self) -> HealthState {
        HealthState::from(self.is_healthy())
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Flip to unhealthy. Returns true if this call made the transition.
    pub fn mark_unhealthy(&self) -> bool {
        self.healthy.swap(false, Ordering::Relaxed)
    }

    /// Flip to healthy. Returns true if this call made the transition.
    pub fn mark_healthy(&self) -> bool {
        !self.healthy.swap(true, Ordering::Relaxed)
    }

    // --- Matching ---

    /// Evaluate the custom matcher if one is set, otherwise the match rules
    /// (OR across rules). Health is not considered.
    pub fn matches_request(&self, request: &Parts) -> bool {
        if let Some(matcher) = &self.matcher {
            return matcher.matches(request, self);
        }
        let host = request_host(request);
        let path = request.uri.path();
        self.rules.iter().any(|rule| rule.matches(host, path))
    }

    /// An unhealthy upstream services nothing; otherwise defer to matching.
    pub fn can_service_request(&self, request: &Parts) -> bool {
        self.is_healthy() && self.matches_request(request)
    }

    // --- Metrics ---

    /// Record the start of a forwarding attempt.
    pub fn record_begin(&self) {
        let offset = Instant::now().saturating_duration_since(self.epoch);
        self.last_request_nanos
            .store(duration_nanos(offset), Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold the latency of a successful attempt into the average.
    pub fn record_finish(&self, elapsed: Duration) {
        let next = ewma(self.average_response_time(), elapsed);
        self.average_response_nanos
            .store(duration_nanos(next), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_error_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Time of the most recent forwarding attempt (creation time if none).
    pub fn last_request(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.last_request_nanos.load(Ordering::Relaxed))
    }

    /// How long the upstream has gone without a forwarding attempt at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_request())
    }

    pub fn average_response_time(&self) -> Duration {
        Duration::from_nanos(self.average_response_nanos.load(Ordering::Relaxed))
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_error_responses(&self) -> u64 {
        self.total_error_responses.load(Ordering::Relaxed)
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl<T: fmt::Debug> fmt::Debug for Upstream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("rules", &self.rules)
            .field("custom_matcher", &self.matcher.is_some())
            .field("healthy", &self.is_healthy())
            .field("metadata", &self.metadata)
            .finish()
    }
}
