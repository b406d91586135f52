use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::load_balancer::LoadBalancer;
use crate::observability::UpstreamMetrics;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub upstreams: usize,
    pub healthy_upstreams: usize,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub address: String,
}

pub async fn get_status<T>(State(balancer): State<Arc<LoadBalancer<T>>>) -> Json<SystemStatus>
where
    T: Send + Sync + 'static,
{
    let upstreams = balancer.upstreams();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        upstreams: upstreams.len(),
        healthy_upstreams: upstreams.iter().filter(|u| u.is_healthy()).count(),
    })
}

pub async fn get_upstreams<T>(
    State(balancer): State<Arc<LoadBalancer<T>>>,
) -> Json<Vec<UpstreamMetrics>>
where
    T: Send + Sync + 'static,
{
    Json(balancer.metrics())
}

/// The upstream whose scheme and host match `address`, if any.
pub async fn lookup_upstream<T>(
    State(balancer): State<Arc<LoadBalancer<T>>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<UpstreamMetrics>, StatusCode>
where
    T: Send + Sync + 'static,
{
    let address = Url::parse(&query.address).map_err(|_| StatusCode::BAD_REQUEST)?;
    balancer
        .upstream_matching(&address)
        .map(|upstream| Json(UpstreamMetrics::of(&*upstream)))
        .ok_or(StatusCode::NOT_FOUND)
}
