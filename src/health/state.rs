//! Upstream health state machine.
//!
//! # States
//! - Healthy: upstream is eligible for selection
//! - Unhealthy: upstream is skipped by selection
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: a forwarding attempt fails in a way that implicates the backend
//! Unhealthy → Healthy: watcher tick finds the upstream idle for at least the cooldown
//! ```

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}
