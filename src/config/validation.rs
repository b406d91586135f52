//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream addresses are usable forwarding targets
//! - Validate value ranges (intervals and budgets > 0, addresses parse)
//! - Detect upstreams that share an address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::UpstreamKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream '{url}' is not a valid URL: {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("upstream '{url}' uses unsupported scheme '{scheme}'")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("upstream '{0}' has no host")]
    MissingHost(String),

    #[error("upstream '{0}' is defined more than once")]
    DuplicateUpstream(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidBindAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for upstream in &config.upstreams {
        let url = match Url::parse(&upstream.url) {
            Ok(url) => url,
            Err(e) => {
                errors.push(ValidationError::InvalidUpstreamUrl {
                    url: upstream.url.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            errors.push(ValidationError::UnsupportedScheme {
                url: upstream.url.clone(),
                scheme: url.scheme().to_string(),
            });
            continue;
        }
        if url.host_str().is_none() {
            errors.push(ValidationError::MissingHost(upstream.url.clone()));
            continue;
        }
        if !seen.insert(UpstreamKey::from_url(&url)) {
            errors.push(ValidationError::DuplicateUpstream(upstream.url.clone()));
        }
    }

    let budgets = [
        ("health.interval_secs", config.health.interval_secs),
        ("failover.selection_attempts", u64::from(config.failover.selection_attempts)),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("limits.max_body_bytes", config.limits.max_body_bytes as u64),
    ];
    for (field, value) in budgets {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let mut addresses = vec![("listener.bind_address", &config.listener.bind_address)];
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    if config.admin.enabled {
        addresses.push(("admin.bind_address", &config.admin.bind_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
