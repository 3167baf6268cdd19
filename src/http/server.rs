//! HTTP host adapter.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (tracing, request timeout)
//! - Turn each HTTP request into a `RequestDescriptor`
//! - Run dispatch off the async workers and convert the `Reply` back
//!
//! # Design Decisions
//! - Axum does no routing of its own; every path reaches the dispatcher
//! - Dispatch runs on the blocking pool since handlers are synchronous

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::dispatch::context::RequestDescriptor;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::reply::Reply;

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status;
        let headers = self.headers.clone();
        let mut response = Response::new(Body::from(self.into_bytes()));
        *response.status_mut() = status;
        response.headers_mut().extend(headers);
        response
    }
}

/// HTTP server hosting a dispatcher.
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server for `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let timeout = Duration::from_secs(dispatcher.config().timeouts.request_secs);
        let router = Self::build_router(Arc::clone(&dispatcher), timeout);
        Self { router, dispatcher }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(dispatcher: Arc<Dispatcher>, timeout: Duration) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(dispatcher)
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until a shutdown signal arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.routes().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for embedding into another service.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Hands every request to the dispatcher.
async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mut descriptor = RequestDescriptor::new(request.method().as_str(), target);
    descriptor.headers = request.headers().clone();
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        descriptor = descriptor.with_client(addr.ip());
    }

    match tokio::task::spawn_blocking(move || dispatcher.dispatch(&descriptor)).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
        }
    }
}
