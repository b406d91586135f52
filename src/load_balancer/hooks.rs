//! Behavioral hooks invoked around forwarding and health transitions.

use axum::body::Body;
use axum::http::{request::Parts, Request, Response};

use crate::http::forward::ForwardError;
use crate::load_balancer::upstream::Upstream;

/// Host-supplied callbacks. Every method defaults to a no-op.
///
/// Hooks run synchronously on the request task (forwarding hooks) or the
/// health watcher task (`on_mark_healthy`) and must not block.
pub trait UpstreamHooks<T>: Send + Sync {
    /// Called after the outbound request is built and before it is sent.
    /// The request may be modified (headers, extensions).
    fn before_forward(&self, _upstream: &Upstream<T>, _request: &mut Request<Body>) {}

    /// Called with the upstream response of a successful attempt.
    fn after_forward(
        &self,
        _upstream: &Upstream<T>,
        _request: &Parts,
        _response: &mut Response<Body>,
    ) {
    }

    /// Called for every failed attempt, whatever its classification.
    fn on_error(&self, _upstream: &Upstream<T>, _request: &Parts, _error: &ForwardError) {}

    fn on_mark_unhealthy(&self, _upstream: &Upstream<T>) {}

    fn on_mark_healthy(&self, _upstream: &Upstream<T>) {}
}
