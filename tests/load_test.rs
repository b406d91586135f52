//! Load testing through the full HTTP front end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use multiproxy::lifecycle::Shutdown;
use multiproxy::{HttpServer, HyperForwarder, LoadBalancer, MatchRule, RequestRouter, Upstream};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    // 1. Setup mock backends
    let mut backends = Vec::new();
    for _ in 0..3 {
        backends.push(common::start_mock_backend("Hello from backend").await);
    }

    // 2. Setup load balancer and router
    let balancer = Arc::new(LoadBalancer::new());
    for addr in &backends {
        balancer.add(
            Upstream::new(format!("http://{addr}").parse().unwrap(), ())
                .with_rule(MatchRule::new("", "/")),
        );
    }
    let router = RequestRouter::new(balancer.clone(), HyperForwarder::default());

    // 3. Start proxy
    let shutdown = Shutdown::new();
    let server = HttpServer::new(Arc::new(router));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();
    let serving = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    // 4. Run load test
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/", proxy_addr);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    // Every attempt is counted on exactly one upstream
    let metrics = balancer.metrics();
    let counted: u64 = metrics.iter().map(|m| m.total_requests).sum();
    assert_eq!(counted, total_requests as u64);
    assert!(metrics.iter().all(|m| m.healthy && m.total_error_responses == 0));

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}
