//! Synthesized responses.
//!
//! # Responsibilities
//! - Map routing outcomes that never reached an upstream to status codes
//!
//! # Design Decisions
//! - No upstream / failover exhausted → 503 Service Unavailable
//! - Error that does not implicate the backend → 502 Bad Gateway
//! - Oversized inbound body → 413 Payload Too Large

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "No server available").into_response()
}

pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}

pub fn payload_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

pub fn bad_request(reason: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, reason).into_response()
}
