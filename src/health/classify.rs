//! Passive failure classification.
//!
//! # Design Decisions
//! - Only connection-establishment failures and 502/503/504 implicate the backend
//! - Timeouts and other transport errors leave health unchanged
//! - 4xx and other 5xx are responses, not failures

use axum::http::StatusCode;

use crate::health::state::HealthState;
use crate::http::forward::ForwardError;

/// Upstream statuses that are treated as a failed forwarding attempt.
pub fn is_failure_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Classify a failed forwarding attempt.
///
/// `Healthy` means the error does not implicate the backend and its health
/// flag should be left as is.
pub fn classify(error: &ForwardError) -> HealthState {
    match error {
        ForwardError::Connect(_) => HealthState::Unhealthy,
        ForwardError::Status(status) if is_failure_status(*status) => HealthState::Unhealthy,
        _ => HealthState::Healthy,
    }
}
