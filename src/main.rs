//! multiproxy host binary.
//!
//! Loads a TOML configuration, builds the load balancer, and serves the
//! proxy (plus the optional admin API and metrics endpoint) until SIGINT or
//! SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use multiproxy::admin::setup_admin_router;
use multiproxy::config::{load_config, ConfigWatcher, ProxyConfig};
use multiproxy::lifecycle::{apply_reload, build_load_balancer, shutdown_signal, Shutdown};
use multiproxy::observability::{init_logging, metrics::init_metrics};
use multiproxy::{HttpServer, HyperForwarder, RequestRouter};

#[derive(Parser)]
#[command(name = "multiproxy", version, about = "Multi-upstream HTTP load balancer")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    init_logging(&config.observability.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "multiproxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        max_failovers = config.failover.max_failovers,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = Shutdown::new();
    let balancer = build_load_balancer(&config)?.start(&config.health);

    // Periodic per-upstream metrics log
    if config.observability.metrics_log_interval_secs > 0 {
        let balancer = balancer.clone();
        let period = Duration::from_secs(config.observability.metrics_log_interval_secs);
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => balancer.log_metrics(),
                    _ = stop.recv() => break,
                }
            }
        });
    }

    // Hot reload of the upstream set
    let _config_watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let guard = watcher.run()?;
            let balancer = balancer.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    if let Err(e) = apply_reload(&balancer, &new_config) {
                        tracing::error!(error = %e, "Failed to apply reloaded upstreams");
                    }
                }
            });
            Some(guard)
        }
        None => None,
    };

    if config.admin.enabled {
        let admin = setup_admin_router(balancer.clone(), &config.admin.api_key);
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let mut stop = shutdown.subscribe();
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        tokio::spawn(async move {
            let served = axum::serve(listener, admin)
                .with_graceful_shutdown(async move { stop.recv().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let router = RequestRouter::new(balancer.clone(), HyperForwarder::new(&config.timeouts))
        .with_failover(config.failover.clone())
        .with_max_body_bytes(config.limits.max_body_bytes);
    let server = HttpServer::new(Arc::new(router));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.trigger();
        });
    }

    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    balancer.dispose();
    tracing::info!("Shutdown complete");
    Ok(())
}
