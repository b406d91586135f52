//! Hop-by-hop header handling.
//!
//! # Responsibilities
//! - Strip connection-scoped headers before a request leaves for an upstream
//! - Strip them again from the upstream response before it reaches the client
//!
//! # Design Decisions
//! - Names listed in `Connection` are removed along with the fixed set
//! - End-to-end headers (including `Host`) pass through untouched

use axum::http::{header, HeaderMap, HeaderName};

/// Headers that only describe a single transport hop.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
