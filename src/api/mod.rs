//! HTTP API for the stand daemon.
//!
//! Thin transport layer: routes deliver structured requests to the
//! `WorkspaceManager`, which owns all orchestration logic.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::manager::WorkspaceManager;

/// Default daemon port.
pub const DEFAULT_PORT: u16 = 7420;

/// Create the API router.
pub fn create_api_router(manager: Arc<WorkspaceManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status API
        .route("/status", get(handlers::status::get_status))
        // Config API (supports the unconfigured daemon)
        .route("/config", put(handlers::config::put_config))
        // Workspaces API
        .route("/workspaces", post(handlers::workspaces::create_workspaces))
        .route(
            "/workspaces/{name}",
            delete(handlers::workspaces::delete_workspace),
        )
        // Preview API
        .route("/preview", post(handlers::preview::switch_preview))
        .route("/preview/logs", get(handlers::preview::stream_logs))
        // Sync API
        .route("/sync", post(handlers::sync::sync_workspaces))
        .route("/sync/rules", post(handlers::sync::sync_rules))
        .layer(cors)
        .with_state(manager)
}

/// Serve the API on localhost until the process is stopped.
pub async fn serve(port: u16, manager: Arc<WorkspaceManager>) -> std::io::Result<()> {
    let router = create_api_router(manager);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    println!("stand daemon listening on http://127.0.0.1:{}", port);
    axum::serve(listener, router).await
}
