use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// User-visible message for every upstream or normalization failure.
pub const ANALYSIS_UNAVAILABLE_MESSAGE: &str = "Analysis service temporarily unavailable";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The model call or its normalization failed. `detail` is only populated
    /// outside production.
    #[error("Analysis unavailable")]
    AnalysisUnavailable { detail: Option<String> },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, detail) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::AnalysisUnavailable { detail } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ANALYSIS_UNAVAILABLE",
                ANALYSIS_UNAVAILABLE_MESSAGE.to_string(),
                detail,
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(detail) = detail {
            error["detail"] = json!(detail);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
