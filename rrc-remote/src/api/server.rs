//! HTTP server setup and routing
//!
//! Sets up Axum HTTP server with routes for control endpoints and SSE.

use crate::engine::NavigationEngine;
use crate::error::{Error, Result};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<NavigationEngine>,
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    use super::{handlers, setlists, sse};

    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))

        // Engine state
        .route("/api/status", get(handlers::status))
        .route("/api/regions", get(handlers::regions))
        .route("/api/regions/reload", post(handlers::reload_regions))

        // Transport control
        .route("/api/transport/play", post(handlers::play))
        .route("/api/transport/pause", post(handlers::pause))
        .route("/api/transport/stop", post(handlers::stop))
        .route("/api/transport/toggle", post(handlers::toggle))

        // Navigation
        .route("/api/navigate/next", post(handlers::next))
        .route("/api/navigate/previous", post(handlers::previous))
        .route("/api/navigate/resume", post(handlers::resume))
        .route("/api/navigate/region/:id", post(handlers::goto_region))
        .route("/api/navigate/item/:index", post(handlers::goto_item))

        // Settings
        .route(
            "/api/settings/advance-mode",
            get(handlers::get_advance_mode).put(handlers::set_advance_mode),
        )

        // Setlists
        .route("/api/setlists", get(setlists::list).post(setlists::create))
        .route("/api/setlists/deactivate", post(setlists::deactivate))
        .route(
            "/api/setlists/:id",
            get(setlists::get).patch(setlists::rename).delete(setlists::remove),
        )
        .route("/api/setlists/:id/items", post(setlists::add_item))
        .route("/api/setlists/:id/items/move", post(setlists::move_item))
        .route("/api/setlists/:id/items/:item_id", delete(setlists::remove_item))
        .route("/api/setlists/:id/activate", post(setlists::activate))

        // SSE event stream
        .route("/api/events", get(sse::event_stream))

        // Attach application context
        .with_state(ctx)

        // Request logging at debug level via tracing
        .layer(TraceLayer::new_for_http())

        // Enable CORS for control surfaces served from elsewhere
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run(
    port: u16,
    engine: Arc<NavigationEngine>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(AppContext { engine });

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
