//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum app with the request router as catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Serve on a host-provided listener until shutdown

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, response::Response, Router};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::forward::{Forwarder, HyperForwarder};
use crate::http::router::RequestRouter;
use crate::lifecycle::ShutdownSignal;

/// HTTP front end for a [`RequestRouter`].
pub struct HttpServer<T, F = HyperForwarder> {
    router: Router,
    proxy: Arc<RequestRouter<T, F>>,
}

impl<T, F> HttpServer<T, F>
where
    T: Send + Sync + 'static,
    F: Forwarder,
{
    pub fn new(proxy: Arc<RequestRouter<T, F>>) -> Self {
        let router = Self::build_router(proxy.clone());
        Self { router, proxy }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(proxy: Arc<RequestRouter<T, F>>) -> Router {
        Router::new()
            .fallback(proxy_handler::<T, F>)
            .with_state(proxy)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The axum app, for embedding into a host's own server.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn proxy(&self) -> &Arc<RequestRouter<T, F>> {
        &self.proxy
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn proxy_handler<T, F>(
    State(proxy): State<Arc<RequestRouter<T, F>>>,
    request: Request<Body>,
) -> Response
where
    T: Send + Sync + 'static,
    F: Forwarder,
{
    proxy.handle(request).await
}
