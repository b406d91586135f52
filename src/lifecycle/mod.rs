//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build load balancer → Start watcher → Start listeners
//!
//! Reload (startup.rs):
//!     New config → Stage upstreams → Apply staged set in one swap
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Dispose → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - One `Shutdown` type serves both the process and each load balancer's lifetime

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
pub use startup::{apply_reload, build_load_balancer, build_upstream, ForwardedHost, UpstreamLabels};
