//! Request matching subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request head (host, path)
//!     → matcher.rs (evaluate an upstream's match rules, OR semantics)
//!     → custom UpstreamMatcher overrides the rules entirely when present
//!     → Return: whether the upstream is eligible for the request
//! ```
//!
//! # Design Decisions
//! - Rules are immutable once created
//! - No regex and no wildcard expansion: exact host, byte-prefix path
//! - Matching is a pure predicate; health gating happens in the upstream

pub mod matcher;

pub use matcher::{host_matches, path_matches, request_host, MatchRule, UpstreamMatcher};
