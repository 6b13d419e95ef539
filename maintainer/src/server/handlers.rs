//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::MaintainerError;
use crate::maintenance::job_control::JobControlStatus;
use crate::nodes::model::{Agent, Event, NodeState};
use crate::nodes::repository::NodeRepository;
use crate::server::state::ServerState;
use crate::utils::version_info;

fn status_of(e: MaintainerError) -> StatusCode {
    match e {
        MaintainerError::NotFound(_) => StatusCode::NOT_FOUND,
        MaintainerError::HistoryOrderError { .. } => StatusCode::CONFLICT,
        e => {
            error!("Admin request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "node-maintainer".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Jobs handler
pub async fn jobs_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<JobControlStatus>, StatusCode> {
    state.job_control.status().await.map(Json).map_err(status_of)
}

/// Set job request
#[derive(Debug, Deserialize)]
pub struct SetJobRequest {
    pub active: bool,
}

/// Activate or deactivate one job
pub async fn set_job_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Json(request): Json<SetJobRequest>,
) -> Result<Json<JobControlStatus>, StatusCode> {
    if !state.job_control.jobs().contains(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    state
        .job_control
        .set_active(&name, request.active)
        .await
        .map_err(status_of)?;
    state.job_control.status().await.map(Json).map_err(status_of)
}

/// Pause all jobs
pub async fn pause_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<JobControlStatus>, StatusCode> {
    state.job_control.pause().await.map_err(status_of)?;
    state.job_control.status().await.map(Json).map_err(status_of)
}

/// Resume all jobs
pub async fn resume_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<JobControlStatus>, StatusCode> {
    state.job_control.resume().await.map_err(status_of)?;
    state.job_control.status().await.map(Json).map_err(status_of)
}

/// Node summary
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    pub hostname: String,
    pub state: NodeState,
    pub owner: Option<String>,
    /// Whether the owner is being deployed right now
    pub deploying: bool,
    pub last_event: Option<Event>,
}

/// Nodes handler
pub async fn nodes_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<NodeInfo>>, StatusCode> {
    let nodes = state.nodes.list_nodes().await.map_err(status_of)?;
    Ok(Json(
        nodes
            .into_iter()
            .map(|node| NodeInfo {
                deploying: node.owner().is_some_and(|owner| state.locks.is_locked(owner)),
                owner: node.owner().map(|owner| owner.to_string()),
                last_event: node.history.last().cloned(),
                hostname: node.hostname,
                state: node.state,
            })
            .collect(),
    ))
}

/// Operator edit request
#[derive(Debug, Deserialize)]
pub struct OperatorEventRequest {
    pub description: String,
}

/// Record a manual operator change on a node
pub async fn operator_event_handler(
    State(state): State<Arc<ServerState>>,
    Path(hostname): Path<String>,
    Json(request): Json<OperatorEventRequest>,
) -> Result<Json<Event>, StatusCode> {
    let node = state
        .nodes
        .record_event(&hostname, Agent::Operator, request.description)
        .await
        .map_err(status_of)?;
    info!("Recorded operator change on {}", hostname);

    node.history
        .last()
        .cloned()
        .map(Json)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}
