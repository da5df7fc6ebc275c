//! Sync API handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::manager::WorkspaceManager;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub all: bool,
    /// Rebuild the active preview when its workspace was just synced.
    #[serde(default = "default_rebuild")]
    pub rebuild_preview: bool,
}

fn default_rebuild() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: Vec<String>,
}

/// POST /sync
pub async fn sync_workspaces(
    State(manager): State<Arc<WorkspaceManager>>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let synced = manager
        .sync_workspaces(
            request.workspace.as_deref(),
            request.all,
            request.rebuild_preview,
        )
        .await?;
    Ok(Json(SyncResponse { synced }))
}

#[derive(Debug, Deserialize)]
pub struct SyncRulesRequest {
    /// Workspace whose rules checkout is published.
    pub workspace: String,
}

#[derive(Debug, Serialize)]
pub struct SyncRulesResponse {
    pub updated: Vec<String>,
}

/// POST /sync/rules
pub async fn sync_rules(
    State(manager): State<Arc<WorkspaceManager>>,
    Json(request): Json<SyncRulesRequest>,
) -> Result<Json<SyncRulesResponse>, ApiError> {
    let updated = manager.sync_rules(&request.workspace).await?;
    Ok(Json(SyncRulesResponse { updated }))
}
