//! API handlers

pub mod config;
pub mod preview;
pub mod status;
pub mod sync;
pub mod workspaces;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::StandError;

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `StandError` mapped onto an HTTP response.
pub struct ApiError(pub StandError);

impl From<StandError> for ApiError {
    fn from(err: StandError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StandError::NotFound(_) => StatusCode::NOT_FOUND,
            StandError::ConfigMissing => StatusCode::CONFLICT,
            StandError::Config(_) | StandError::JsonParse(_) => StatusCode::BAD_REQUEST,
            StandError::Git(_)
            | StandError::Hook(_)
            | StandError::Process(_)
            | StandError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError(StandError::not_found("workspace 'x'")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_config_missing_maps_to_409() {
        let response = ApiError(StandError::ConfigMissing).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
