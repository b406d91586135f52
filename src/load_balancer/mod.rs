//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request head (host, path)
//!     → registry.rs (snapshot of the live upstream set)
//!     → upstream.rs (health gate + match rules per upstream)
//!     → uniform random pick among the eligible upstreams
//!     → Return upstream or "none available"
//!
//! Reconfiguration:
//!     add / set_upstreams          → replace live set
//!     add_staged … apply_staged    → build aside, swap in one step
//! ```
//!
//! # Design Decisions
//! - Live set is an `ArcSwap`: readers never see a half-applied set
//! - Per-upstream state is plain atomics, no locks on the hot path
//! - Unhealthy upstreams are excluded from selection
//! - Behavioral hooks are an optional capability object, not subclassing

pub mod hooks;
pub mod registry;
pub mod upstream;

pub use hooks::UpstreamHooks;
pub use registry::LoadBalancer;
pub use upstream::{ewma, Upstream, UpstreamKey};
