//! Axum server wiring for the streaming gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use shoal_core::config::ShoalConfig;
use shoal_core::{ShoalError, SwarmClient, SwarmSessionRegistry};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{health, list_sessions, stream_delete, stream_get, stream_head};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: SwarmSessionRegistry,
    pub config: Arc<ShoalConfig>,
    pub started_at: Instant,
}

impl AppState {
    /// Builds the registry over `client` using the gateway section of `config`.
    pub fn new(config: ShoalConfig, client: Arc<dyn SwarmClient>) -> Self {
        let registry = SwarmSessionRegistry::new(client, config.gateway.clone());
        Self {
            registry,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

/// Router with every gateway route, ready for `axum::serve` or `oneshot`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/stream",
            get(stream_get).head(stream_head).delete(stream_delete),
        )
        .route("/sessions", get(list_sessions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the gateway until ctrl-c, then destroys every session.
///
/// # Errors
/// - `ShoalError::Io` - Listener could not bind or the server failed
pub async fn run_server(state: AppState) -> Result<(), ShoalError> {
    let address = state.config.server.bind_address();
    let registry = state.registry.clone();

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "shoal gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    info!("shoal gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
