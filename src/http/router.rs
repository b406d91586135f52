//! Per-request routing: select, forward, observe, fail over.
//!
//! # Responsibilities
//! - Pick a random eligible upstream for the request
//! - Record attempt metrics and invoke hooks around forwarding
//! - On a backend failure, mark the upstream unhealthy and retry elsewhere
//! - Fold every outcome into exactly one response for the caller
//!
//! # Design Decisions
//! - Failover is a bounded loop with an accumulating set of tried upstreams
//! - Errors that do not implicate the backend are not retried
//! - The caller never sees intermediate attempts

use std::collections::HashSet;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, Request};
use axum::response::Response;
use http_body_util::LengthLimitError;
use tokio::time::Instant;

use crate::config::FailoverConfig;
use crate::health::classify::is_failure_status;
use crate::http::forward::{ForwardError, Forwarder, HyperForwarder};
use crate::http::request::build_upstream_request;
use crate::http::response;
use crate::load_balancer::{LoadBalancer, Upstream};
use crate::observability::metrics;
use crate::resilience::retries::select_untried;
use crate::routing::matcher::request_host;

/// Routes inbound requests across a [`LoadBalancer`]'s upstreams.
pub struct RequestRouter<T, F = HyperForwarder> {
    balancer: Arc<LoadBalancer<T>>,
    forwarder: F,
    failover: FailoverConfig,
    max_body_bytes: usize,
}

impl<T, F> RequestRouter<T, F>
where
    T: Send + Sync + 'static,
    F: Forwarder,
{
    pub fn new(balancer: Arc<LoadBalancer<T>>, forwarder: F) -> Self {
        Self {
            balancer,
            forwarder,
            failover: FailoverConfig::default(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }

    pub fn with_failover(mut self, failover: FailoverConfig) -> Self {
        self.failover = failover;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer<T>> {
        &self.balancer
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let method = parts.method.as_str();

        if declared_length(&parts).is_some_and(|len| len > self.max_body_bytes) {
            metrics::record_request(method, 413, "none", start.elapsed());
            return response::payload_too_large();
        }
        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) if exceeds_limit(&e) => {
                metrics::record_request(method, 413, "none", start.elapsed());
                return response::payload_too_large();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                metrics::record_request(method, 400, "none", start.elapsed());
                return response::bad_request("Failed to read request body");
            }
        };

        let Some(mut upstream) = self.balancer.random(&parts) else {
            tracing::warn!(
                host = %request_host(&parts),
                path = %parts.uri.path(),
                "No upstream available"
            );
            metrics::record_request(method, 503, "none", start.elapsed());
            return response::service_unavailable();
        };

        let mut tried = HashSet::new();
        let mut failovers = 0u32;

        loop {
            tried.insert(upstream.key().clone());

            let error = match self.attempt(&upstream, &parts, &body).await {
                Ok(response) => {
                    metrics::record_request(
                        method,
                        response.status().as_u16(),
                        upstream.host(),
                        start.elapsed(),
                    );
                    return response;
                }
                Err(e) => e,
            };

            tracing::error!(
                upstream = %upstream.key(),
                attempt = failovers + 1,
                error = %error,
                "Upstream error"
            );

            let verdict = self.balancer.report_error(&upstream, &parts, &error);
            if verdict.is_healthy() {
                metrics::record_request(method, 502, upstream.host(), start.elapsed());
                return response::bad_gateway();
            }

            if failovers >= self.failover.max_failovers {
                tracing::warn!(
                    failovers,
                    "Failover limit reached, giving up"
                );
                metrics::record_request(method, 503, upstream.host(), start.elapsed());
                return response::service_unavailable();
            }

            let next = select_untried(
                || self.balancer.random(&parts),
                |candidate| !tried.contains(candidate.key()),
                self.failover.selection_attempts,
            );
            let Some(next) = next else {
                tracing::warn!(
                    failed = %upstream.key(),
                    "No other upstream available for failover"
                );
                metrics::record_request(method, 503, upstream.host(), start.elapsed());
                return response::service_unavailable();
            };

            tracing::info!(from = %upstream.key(), to = %next.key(), "Failing over");
            metrics::record_failover();
            failovers += 1;
            upstream = next;
        }
    }

    /// One forwarding attempt against `upstream`. Gateway failure statuses
    /// are returned as errors and their response is discarded.
    async fn attempt(
        &self,
        upstream: &Upstream<T>,
        parts: &Parts,
        body: &Bytes,
    ) -> Result<Response, ForwardError> {
        let mut request = build_upstream_request(upstream.url(), parts, body.clone())?;
        upstream.record_begin();
        if let Some(hooks) = self.balancer.hooks() {
            hooks.before_forward(upstream, &mut request);
        }

        let sent = Instant::now();
        let mut response = self.forwarder.forward(request).await?;
        let status = response.status();
        if is_failure_status(status) {
            return Err(ForwardError::Status(status));
        }

        if let Some(hooks) = self.balancer.hooks() {
            hooks.after_forward(upstream, parts, &mut response);
        }
        upstream.record_finish(sent.elapsed());
        Ok(response)
    }
}

/// True if reading the body failed because it outgrew the buffer limit.
fn exceeds_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn declared_length(parts: &Parts) -> Option<usize> {
    parts
        .headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::UpstreamHooks;
    use crate::routing::matcher::MatchRule;
    use axum::http::StatusCode;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted forwarder: status per upstream authority, or a connect error.
    #[derive(Default)]
    struct ScriptedForwarder {
        statuses: HashMap<String, Option<StatusCode>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedForwarder {
        fn with(mut self, authority: &str, status: Option<StatusCode>) -> Self {
            self.statuses.insert(authority.to_string(), status);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl Forwarder for Arc<ScriptedForwarder> {
        async fn forward(&self, request: Request<Body>) -> Result<Response, ForwardError> {
            let authority = request.uri().authority().unwrap().to_string();
            self.calls.lock().push(request.uri().to_string());
            match self.statuses.get(&authority).copied().flatten() {
                Some(status) => Ok(Response::builder()
                    .status(status)
                    .body(Body::from(authority))
                    .unwrap()),
                None => {
                    let refused =
                        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
                    Err(ForwardError::Connect(Box::new(refused)))
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        before: AtomicUsize,
        after: AtomicUsize,
        errors: AtomicUsize,
        unhealthy: AtomicUsize,
    }

    impl UpstreamHooks<()> for Arc<RecordingHooks> {
        fn before_forward(&self, _: &Upstream, request: &mut Request<Body>) {
            self.before.fetch_add(1, Ordering::SeqCst);
            request
                .headers_mut()
                .insert("x-forwarded-by", "multiproxy".parse().unwrap());
        }
        fn after_forward(&self, _: &Upstream, _: &Parts, _: &mut Response) {
            self.after.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _: &Upstream, _: &Parts, _: &ForwardError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_mark_unhealthy(&self, _: &Upstream) {
            self.unhealthy.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn balancer(hooks: Arc<RecordingHooks>, ports: &[u16]) -> Arc<LoadBalancer> {
        let lb = LoadBalancer::new().with_hooks(hooks);
        for port in ports {
            lb.add(
                Upstream::new(format!("http://10.0.0.1:{port}").parse().unwrap(), ())
                    .with_rule(MatchRule::host("example.com")),
            );
        }
        Arc::new(lb)
    }

    fn inbound(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("Host", "example.com")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_no_upstream_is_service_unavailable() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder = Arc::new(ScriptedForwarder::default());
        let router = RequestRouter::new(lb, forwarder.clone());

        let response = router
            .handle(
                Request::builder()
                    .uri("/")
                    .header("Host", "unknown.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_success_updates_metrics_and_hooks() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder =
            Arc::new(ScriptedForwarder::default().with("10.0.0.1:4000", Some(StatusCode::OK)));
        let router = RequestRouter::new(lb.clone(), forwarder.clone());

        let response = router.handle(inbound("/hello?x=1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(forwarder.calls(), vec!["http://10.0.0.1:4000/hello?x=1"]);

        let upstream = &lb.upstreams()[0];
        assert_eq!(upstream.total_requests(), 1);
        assert_eq!(upstream.total_error_responses(), 0);
        assert_eq!(hooks.before.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failover_to_distinct_upstream() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000, 4001]);
        let forwarder = Arc::new(
            ScriptedForwarder::default()
                .with("10.0.0.1:4000", Some(StatusCode::BAD_GATEWAY))
                .with("10.0.0.1:4001", Some(StatusCode::OK)),
        );
        let router = RequestRouter::new(lb.clone(), forwarder.clone());

        // Either upstream may be picked first; every request must succeed on 4001.
        for _ in 0..10 {
            let response = router.handle(inbound("/")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "10.0.0.1:4001");
            lb.upstreams()[0].set_healthy(true);
        }

        let failing = &lb.upstreams()[0];
        assert_eq!(failing.total_requests(), failing.total_error_responses());
        assert_eq!(
            hooks.errors.load(Ordering::SeqCst) as u64,
            failing.total_error_responses()
        );
        assert_eq!(
            hooks.after.load(Ordering::SeqCst),
            10,
            "after-forward runs only for the successful attempt"
        );
    }

    #[tokio::test]
    async fn test_exhaustion_returns_single_service_unavailable() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder = Arc::new(
            ScriptedForwarder::default().with("10.0.0.1:4000", Some(StatusCode::SERVICE_UNAVAILABLE)),
        );
        let router = RequestRouter::new(lb.clone(), forwarder.clone());

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(forwarder.calls().len(), 1);

        let upstream = &lb.upstreams()[0];
        assert!(!upstream.is_healthy());
        assert_eq!(upstream.total_error_responses(), 1);
        assert_eq!(hooks.unhealthy.load(Ordering::SeqCst), 1);

        // Still unhealthy: the next request never reaches it
        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(forwarder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_error_fails_over() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000, 4001]);
        let forwarder = Arc::new(
            ScriptedForwarder::default()
                .with("10.0.0.1:4000", None)
                .with("10.0.0.1:4001", Some(StatusCode::OK)),
        );
        let router = RequestRouter::new(lb.clone(), forwarder);

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_gateway_error_status_is_forwarded() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder = Arc::new(
            ScriptedForwarder::default()
                .with("10.0.0.1:4000", Some(StatusCode::INTERNAL_SERVER_ERROR)),
        );
        let router = RequestRouter::new(lb.clone(), forwarder);

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(lb.upstreams()[0].is_healthy());
        assert_eq!(hooks.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failover_ceiling() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000, 4001, 4002, 4003]);
        let forwarder = Arc::new(ScriptedForwarder::default());
        let router = RequestRouter::new(lb.clone(), forwarder.clone()).with_failover(
            FailoverConfig {
                selection_attempts: 20,
                max_failovers: 1,
            },
        );

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(forwarder.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_each_upstream_tried_once() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000, 4001, 4002]);
        let forwarder = Arc::new(ScriptedForwarder::default());
        let router = RequestRouter::new(lb.clone(), forwarder.clone());

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let mut calls = forwarder.calls();
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 3);
        assert_eq!(forwarder.calls().len(), 3);
        assert!(lb.upstreams().iter().all(|u| !u.is_healthy()));
    }

    #[tokio::test]
    async fn test_oversized_chunked_body_rejected() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder =
            Arc::new(ScriptedForwarder::default().with("10.0.0.1:4000", Some(StatusCode::OK)));
        let router = RequestRouter::new(lb, forwarder.clone()).with_max_body_bytes(4);

        // No Content-Length: the limit is only hit while reading
        let response = router
            .handle(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("Host", "example.com")
                    .header("Transfer-Encoding", "chunked")
                    .body(Body::from("0123456789"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unbuildable_request_is_not_counted() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = Arc::new(LoadBalancer::new().with_hooks(hooks.clone()));
        // A base without a host cannot carry an outbound URI
        let upstream = lb.add(
            Upstream::new("unix:/run/app.sock".parse().unwrap(), ())
                .with_rule(MatchRule::default()),
        );
        let forwarder = Arc::new(ScriptedForwarder::default());
        let router = RequestRouter::new(lb.clone(), forwarder.clone());

        let response = router.handle(inbound("/")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(forwarder.calls().is_empty());
        assert_eq!(upstream.total_requests(), 0);
        assert_eq!(hooks.before.load(Ordering::SeqCst), 0);
        assert!(upstream.is_healthy());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let hooks = Arc::new(RecordingHooks::default());
        let lb = balancer(hooks.clone(), &[4000]);
        let forwarder =
            Arc::new(ScriptedForwarder::default().with("10.0.0.1:4000", Some(StatusCode::OK)));
        let router = RequestRouter::new(lb, forwarder.clone()).with_max_body_bytes(4);

        let response = router
            .handle(
                Request::builder()
                    .uri("/")
                    .header("Host", "example.com")
                    .header("Content-Length", "10")
                    .body(Body::from("0123456789"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(forwarder.calls().is_empty());
    }
}
