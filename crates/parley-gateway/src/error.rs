//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use parley_core::error::ParleyError;
use parley_core::types::StageFailure;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Pipeline failure on `POST /`: a bare 500 with no per-stage detail.
    Internal,
    /// Pipeline failure on `POST /conversation`.
    Stage { stage: String, message: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Structured form of a pipeline error.
    pub fn stage(err: &ParleyError) -> Self {
        Self::Stage {
            stage: err.stage().unwrap_or("internal").to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
            Self::Stage { stage, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StageFailure {
                    success: false,
                    stage,
                    message,
                }),
            )
                .into_response(),
        }
    }
}
