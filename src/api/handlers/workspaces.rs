//! Workspaces API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::manager::WorkspaceManager;

#[derive(Debug, Deserialize)]
pub struct CreateWorkspacesRequest {
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateWorkspacesResponse {
    /// Names newly registered by this call (idempotent: already-known
    /// names are skipped, not errored).
    pub created: Vec<String>,
}

/// POST /workspaces
pub async fn create_workspaces(
    State(manager): State<Arc<WorkspaceManager>>,
    Json(request): Json<CreateWorkspacesRequest>,
) -> Result<Json<CreateWorkspacesResponse>, ApiError> {
    let created = manager.create_workspaces(&request.names).await?;
    Ok(Json(CreateWorkspacesResponse { created }))
}

/// DELETE /workspaces/{name}
pub async fn delete_workspace(
    State(manager): State<Arc<WorkspaceManager>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    manager.delete_workspace(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
