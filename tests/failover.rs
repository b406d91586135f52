//! Failover behavior against real backends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use multiproxy::config::FailoverConfig;
use multiproxy::{HyperForwarder, LoadBalancer, MatchRule, RequestRouter, Upstream};

mod common;

fn upstream(addr: std::net::SocketAddr) -> Upstream {
    Upstream::new(format!("http://{addr}").parse().unwrap(), ()).with_rule(MatchRule::default())
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("host", "app.example.com")
        .body(Body::empty())
        .unwrap()
}

fn counted(status: u16, calls: Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<(u16, String)> {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready((status, format!("status {status}")))
    }
}

#[tokio::test]
async fn test_fails_over_from_bad_gateway() {
    let bad_calls = Arc::new(AtomicU32::new(0));
    let bad = common::start_programmable_backend(counted(502, bad_calls.clone())).await;
    let good = common::start_mock_backend("Hello from backend").await;

    let balancer = Arc::new(LoadBalancer::new());
    let bad = balancer.add(upstream(bad));
    let good = balancer.add(upstream(good));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    // Whichever upstream is picked first, every request succeeds
    for _ in 0..10 {
        let response = router.handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Hello from backend");
    }

    // The failing upstream was hit at most once before leaving rotation
    assert!(bad_calls.load(Ordering::SeqCst) <= 1);
    if bad_calls.load(Ordering::SeqCst) == 1 {
        assert!(!bad.is_healthy());
        assert_eq!(bad.total_error_responses(), 1);
    }
    assert!(good.is_healthy());
    assert_eq!(good.total_requests(), 10);
}

#[tokio::test]
async fn test_single_unavailable_upstream_yields_one_503() {
    let calls = Arc::new(AtomicU32::new(0));
    let addr = common::start_programmable_backend(counted(503, calls.clone())).await;

    let balancer = Arc::new(LoadBalancer::new());
    let only = balancer.add(upstream(addr));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    let response = router.handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"No server available");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!only.is_healthy());

    // Out of rotation: the next request is refused without contacting it
    let response = router.handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fails_over_from_unreachable_upstream() {
    let good = common::start_mock_backend("ok").await;

    let balancer = Arc::new(LoadBalancer::new());
    let dead = balancer.add(upstream(common::dead_address()));
    balancer.add(upstream(good));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    for _ in 0..5 {
        let response = router.handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(dead.total_requests() <= 1);
}

#[tokio::test]
async fn test_server_error_is_passed_through() {
    let addr = common::start_programmable_backend(|| async { (500, "boom".to_string()) }).await;

    let balancer = Arc::new(LoadBalancer::new());
    let only = balancer.add(upstream(addr));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    let response = router.handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(only.is_healthy());
    assert_eq!(only.total_error_responses(), 0);
}

#[tokio::test]
async fn test_zero_failovers_gives_up_after_first_failure() {
    let bad_calls = Arc::new(AtomicU32::new(0));
    let good_calls = Arc::new(AtomicU32::new(0));
    let bad = common::start_programmable_backend(counted(504, bad_calls.clone())).await;
    let good = common::start_programmable_backend(counted(200, good_calls.clone())).await;

    let balancer = Arc::new(LoadBalancer::new());
    balancer.add(upstream(bad));
    balancer.add(upstream(good));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default()).with_failover(
        FailoverConfig {
            selection_attempts: 20,
            max_failovers: 0,
        },
    );

    let mut statuses = Vec::new();
    for _ in 0..10 {
        statuses.push(router.handle(get("/")).await.status());
    }

    // At most one request hit the failing upstream and was not retried
    let refused = statuses
        .iter()
        .filter(|s| **s == StatusCode::SERVICE_UNAVAILABLE)
        .count();
    assert_eq!(bad_calls.load(Ordering::SeqCst) as usize, refused);
    assert!(bad_calls.load(Ordering::SeqCst) <= 1);
    assert_eq!(good_calls.load(Ordering::SeqCst), 10 - bad_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_hop_by_hop_response_headers_are_dropped() {
    let addr = common::start_mock_backend("ok").await;

    let balancer = Arc::new(LoadBalancer::new());
    balancer.add(upstream(addr));
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    // The mock backend answers with `Connection: close`
    let response = router.handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("connection").is_none());
    assert_eq!(response.headers()["content-length"], "2");
}
