//! HTTP front end.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /api/version` | Server version |
//! | `GET /api/health` | Liveness check |
//! | `POST /api/pipeline` | Run a graph over an uploaded image, returns PNG |
//! | `POST /process` | Same as `/api/pipeline` |
//!
//! Pipeline requests are `multipart/form-data` with a `file` part holding
//! the image and a `graph` (or `pipeline`) part holding the graph JSON.

mod handlers;
mod types;

pub use handlers::{ApiError, health_check, run_pipeline, version};
pub use types::{HealthResponse, VersionResponse};

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
use crate::error::Result;
use crate::pipeline::PipelineExecutor;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// State shared across handlers.
#[derive(Clone)]
pub struct ServerState {
    /// Executor every request runs on.
    pub executor: Arc<PipelineExecutor>,
    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,
}

impl ServerState {
    /// Create state around an executor with the default body limit.
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        Self {
            executor,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Build state from a server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            executor: Arc::new(config.build_executor()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("executor", &self.executor)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ServerState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/api/version", get(version))
        .route("/api/health", get(health_check))
        .route("/api/pipeline", post(run_pipeline))
        // Route used by the browser frontend.
        .route("/process", post(run_pipeline))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(config: &ServerConfig) -> Result<()> {
    let addr = config.bind_addr()?;
    let app = build_router(ServerState::from_config(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        plugins_dir = %config.plugins_dir.display(),
        plugin_cache = config.plugin_cache,
        "visionflow server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("visionflow server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
