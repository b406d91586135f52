//! Admin API.
//!
//! # Responsibilities
//! - Report process status
//! - Expose the per-upstream metrics snapshot
//! - Look up the upstream serving a given address
//!
//! # Design Decisions
//! - Served on its own listener, never on the proxy port
//! - Every route requires `Authorization: Bearer <api_key>`

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::{get_status, get_upstreams, lookup_upstream};
use crate::load_balancer::LoadBalancer;

pub fn setup_admin_router<T>(balancer: Arc<LoadBalancer<T>>, api_key: &str) -> Router
where
    T: Send + Sync + 'static,
{
    let api_key: Arc<str> = Arc::from(api_key);

    Router::new()
        .route("/admin/status", get(get_status::<T>))
        .route("/admin/upstreams", get(get_upstreams::<T>))
        .route("/admin/lookup", get(lookup_upstream::<T>))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(balancer)
}
