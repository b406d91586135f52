//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (axum app, request id, tracing)
//!     → router.rs (select upstream, failover loop)
//!     → request.rs (rewrite URI onto the upstream base)
//!     → headers.rs (drop hop-by-hop headers, both directions)
//!     → forward.rs (send via the Forwarder)
//!     → response.rs (synthesized 503/502/413 when nothing was forwarded)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use forward::{ForwardError, Forwarder, HyperForwarder};
pub use router::RequestRouter;
pub use server::HttpServer;
