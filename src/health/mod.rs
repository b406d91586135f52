//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (classify.rs):
//!     Forwarding attempt fails
//!     → connection failure or 502/503/504?
//!     → mark upstream Unhealthy
//!
//! Re-admission (watcher.rs):
//!     Periodic timer
//!     → every Unhealthy upstream idle for at least the cooldown
//!     → mark Healthy again (no probe; the next request confirms)
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy, no terminal state
//! ```
//!
//! # Design Decisions
//! - Health is inferred from traffic outcomes plus a cooldown
//! - Re-admission is time-based, so an idle upstream recovers by the clock
//! - Health state is per-upstream, never shared across processes

pub mod classify;
pub mod state;
pub mod watcher;

pub use classify::{classify, is_failure_status};
pub use state::HealthState;
pub use watcher::HealthWatcher;
