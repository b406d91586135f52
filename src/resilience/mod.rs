//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding attempt fails and the upstream is marked unhealthy:
//!     → retries.rs (draw a random eligible upstream not yet tried)
//!     → bounded per failure (selection attempts) and per request (max failovers)
//! ```
//!
//! # Design Decisions
//! - Failover is an explicit loop, never recursion
//! - An upstream is attempted at most once per inbound request
//! - No backoff: failover targets a different upstream immediately

pub mod retries;

pub use retries::select_untried;
