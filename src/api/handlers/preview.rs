//! Preview API handlers
//!
//! `POST /preview` runs the full switch; `GET /preview/logs` attaches the
//! client to the supervisor's log stream. A new switch preempts every
//! attached client by terminating its stream with the end marker.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::ApiError;
use crate::manager::WorkspaceManager;
use crate::runner::supervisor::{LogEvent, LOG_STREAM_END};

#[derive(Debug, Deserialize)]
pub struct SwitchPreviewRequest {
    pub workspace: String,
    #[serde(default)]
    pub rebuild: bool,
}

#[derive(Debug, Serialize)]
pub struct SwitchPreviewResponse {
    pub active_preview: String,
}

/// POST /preview
pub async fn switch_preview(
    State(manager): State<Arc<WorkspaceManager>>,
    Json(request): Json<SwitchPreviewRequest>,
) -> Result<Json<SwitchPreviewResponse>, ApiError> {
    manager
        .switch_preview(&request.workspace, request.rebuild)
        .await?;
    Ok(Json(SwitchPreviewResponse {
        active_preview: request.workspace,
    }))
}

/// GET /preview/logs
///
/// Plain-text line stream: one log line per line, terminated by
/// [`LOG_STREAM_END`] when the session stops or a new switch preempts the
/// subscriber.
pub async fn stream_logs(
    State(manager): State<Arc<WorkspaceManager>>,
) -> Result<Response, ApiError> {
    let subscriber = manager.subscribe_logs()?;

    let stream = UnboundedReceiverStream::new(subscriber).scan(false, |ended, event| {
        if *ended {
            return futures::future::ready(None);
        }
        let line = match event {
            LogEvent::Line(line) => format!("{}\n", line),
            LogEvent::Eof => {
                *ended = true;
                format!("{}\n", LOG_STREAM_END)
            }
        };
        futures::future::ready(Some(Ok::<_, Infallible>(line)))
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}
