//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, registry and watcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms; per-upstream snapshot)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Admin API / periodic log line (upstream snapshot)
//! ```
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The per-upstream snapshot reads atomics only; no locks

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::UpstreamMetrics;
