//! Forwarding to the selected upstream.
//!
//! # Responsibilities
//! - Define the forwarding seam (`Forwarder`) the request router calls
//! - Provide the default hyper-based implementation
//! - Distinguish connection failures from other transport errors
//!
//! # Design Decisions
//! - Byte-level forwarding (streaming, pooling) belongs to the client
//! - Connect timeouts surface as connection failures; request timeouts do not
//! - Hop-by-hop headers of the upstream response are dropped

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::config::TimeoutConfig;
use crate::http::headers::strip_hop_by_hop;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed forwarding attempt.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream could not be reached at all.
    #[error("failed to connect to upstream: {0}")]
    Connect(#[source] BoxError),

    /// The upstream answered with a gateway failure status.
    #[error("upstream responded with {0}")]
    Status(StatusCode),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport error after the connection was made.
    #[error("upstream request failed: {0}")]
    Request(#[source] BoxError),

    /// The outbound request could not be built from the upstream address.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

/// Sends an already-rewritten request to its upstream.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// Default forwarder backed by a pooled hyper client (plain HTTP).
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperForwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }
}

impl Default for HyperForwarder {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

impl Forwarder for HyperForwarder {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        match time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(into_body(response)),
            Ok(Err(e)) if e.is_connect() => Err(ForwardError::Connect(Box::new(e))),
            Ok(Err(e)) => Err(ForwardError::Request(Box::new(e))),
            Err(_) => Err(ForwardError::Timeout(self.request_timeout)),
        }
    }
}

fn into_body(response: Response<Incoming>) -> Response<Body> {
    let mut response = response.map(Body::new);
    strip_hop_by_hop(response.headers_mut());
    response
}
