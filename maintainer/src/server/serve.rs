//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::MaintainerError;
use crate::server::handlers::{
    health_handler, jobs_handler, nodes_handler, operator_event_handler, pause_handler,
    resume_handler, set_job_handler, version_handler,
};
use crate::server::state::ServerState;

/// Routes of the admin server
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Job control
        .route("/jobs", get(jobs_handler))
        .route("/jobs/pause", post(pause_handler))
        .route("/jobs/resume", post(resume_handler))
        .route("/jobs/{name}", put(set_job_handler))
        // Nodes
        .route("/nodes", get(nodes_handler))
        .route("/nodes/{hostname}/events", post(operator_event_handler))
        // State and middleware
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), MaintainerError>>, MaintainerError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting admin HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MaintainerError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| MaintainerError::ServerError(e.to_string()))
    });

    Ok(handle)
}
