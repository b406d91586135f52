//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn validated upstream configuration into live upstreams
//! - Build the host's load balancer with its default hooks
//! - Apply reloaded configuration through the staged set
//!
//! # Design Decisions
//! - Fail fast: an unparsable upstream address aborts startup
//! - A reload that fails to parse leaves the live set untouched
//! - Reloaded upstreams start fresh (healthy, zeroed counters)

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{header, HeaderName, Request};
use url::Url;

use crate::config::{ProxyConfig, UpstreamConfig};
use crate::load_balancer::{LoadBalancer, Upstream, UpstreamHooks};

/// Metadata the host binary attaches to each upstream.
pub type UpstreamLabels = BTreeMap<String, String>;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Default host hook: records the client-facing host in `X-Forwarded-Host`.
///
/// An existing `X-Forwarded-Host` is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardedHost;

impl<T> UpstreamHooks<T> for ForwardedHost {
    fn before_forward(&self, _upstream: &Upstream<T>, request: &mut Request<Body>) {
        let headers = request.headers_mut();
        if headers.contains_key(&X_FORWARDED_HOST) {
            return;
        }
        if let Some(host) = headers.get(header::HOST).cloned() {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }
}

pub fn build_upstream(
    config: &UpstreamConfig,
) -> Result<Upstream<UpstreamLabels>, url::ParseError> {
    let url = Url::parse(&config.url)?;
    let mut upstream =
        Upstream::new(url, config.labels.clone()).with_rules(config.matches.iter().cloned());
    if let Some(id) = &config.id {
        upstream = upstream.with_id(id.clone());
    }
    Ok(upstream)
}

/// Build the load balancer described by `config`. The health watcher is not
/// started.
pub fn build_load_balancer(
    config: &ProxyConfig,
) -> Result<LoadBalancer<UpstreamLabels>, url::ParseError> {
    let upstreams = config
        .upstreams
        .iter()
        .map(build_upstream)
        .collect::<Result<Vec<_>, _>>()?;

    let balancer = LoadBalancer::new().with_hooks(ForwardedHost);
    balancer.set_upstreams(upstreams);
    Ok(balancer)
}

/// Replace the live upstream set with the one in `config` in a single swap.
/// Returns the number of upstreams now live.
pub fn apply_reload(
    balancer: &LoadBalancer<UpstreamLabels>,
    config: &ProxyConfig,
) -> Result<usize, url::ParseError> {
    let upstreams = config
        .upstreams
        .iter()
        .map(build_upstream)
        .collect::<Result<Vec<_>, _>>()?;

    balancer.clear_staged();
    for upstream in upstreams {
        balancer.add_staged(upstream);
    }
    balancer.apply_staged();

    let live = balancer.upstreams().len();
    tracing::info!(upstreams = live, "Configuration reloaded");
    Ok(live)
}
