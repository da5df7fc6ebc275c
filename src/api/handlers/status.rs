//! Status API handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::manager::WorkspaceManager;
use crate::model::DaemonStatus;

/// GET /status
pub async fn get_status(State(manager): State<Arc<WorkspaceManager>>) -> Json<DaemonStatus> {
    Json(manager.get_status().await)
}
