//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use nifcloud_rdb::MetricStatistics;

use crate::collector::SharedCollector;

/// Application state shared across handlers.
struct AppState<C> {
    collector: SharedCollector<C>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
        }
    }
}

/// Create the HTTP router.
fn create_router<C: MetricStatistics + 'static>(
    collector: SharedCollector<C>,
    metrics_path: &str,
) -> Router {
    let state = AppState { collector };

    Router::new()
        .route(metrics_path, get(metrics_handler::<C>))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint. Every request runs a full scrape pass.
async fn metrics_handler<C: MetricStatistics + 'static>(
    State(state): State<AppState<C>>,
) -> Response {
    let body = state.collector.render().await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Parse a listen address, accepting the bare `:port` form.
pub fn parse_listen_address(addr: &str) -> anyhow::Result<SocketAddr> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };

    full.parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))
}

/// HTTP server configuration.
pub struct HttpServer<C> {
    collector: SharedCollector<C>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<C: MetricStatistics + 'static> HttpServer<C> {
    /// Create a new HTTP server.
    pub fn new(
        collector: SharedCollector<C>,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.collector, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
