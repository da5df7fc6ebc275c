//! Config API handler
//!
//! Lets a client configure an unconfigured daemon (or replace the
//! configuration) at runtime.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::ApiError;
use crate::config::WorkspaceConfig;
use crate::manager::WorkspaceManager;

/// PUT /config
pub async fn put_config(
    State(manager): State<Arc<WorkspaceManager>>,
    Json(config): Json<WorkspaceConfig>,
) -> Result<StatusCode, ApiError> {
    manager.configure(config).await?;
    Ok(StatusCode::NO_CONTENT)
}
