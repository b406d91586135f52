//! Multi-upstream HTTP load balancer.
//!
//! Requests are routed to a randomly chosen healthy upstream whose match
//! rules accept them. Upstreams that fail at the gateway level are taken
//! out of rotation and the request fails over to another candidate; a
//! background watcher re-admits them after a quiet period.
//!
//! ```text
//!     Client ──▶ HttpServer ──▶ RequestRouter ──▶ LoadBalancer::random
//!                                    │                     │
//!                                    ▼                     ▼
//!                               Forwarder ──▶ Upstream   HealthWatcher
//!                                    │                (re-admission)
//!                                    ▼
//!                         success / failover / 503
//! ```

// Core
pub mod http;
pub mod load_balancer;
pub mod routing;

// Traffic management
pub mod health;
pub mod resilience;

// Host surfaces
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::{ForwardError, Forwarder, HttpServer, HyperForwarder, RequestRouter};
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancer, Upstream, UpstreamHooks};
pub use observability::UpstreamMetrics;
pub use routing::{MatchRule, UpstreamMatcher};
