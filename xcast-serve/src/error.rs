use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use libxcast::error::ItemError;
use libxcast::XcastError;
use serde_json::json;

/// Error type for HTTP handlers
///
/// Wraps [`XcastError`] for domain errors and adds request-shape errors.
/// Renders as `{"error": message, "code": CODE}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] XcastError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut errors: Option<&[ItemError]> = None;

        let (status, code, message) = match &self {
            AppError::Domain(err) => match err {
                XcastError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                XcastError::BatchRejected { errors: items } => {
                    errors = Some(items);
                    (StatusCode::BAD_REQUEST, "BATCH_REJECTED", err.to_string())
                }
                XcastError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                XcastError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                XcastError::Delivery(delivery) => {
                    tracing::error!(error = %delivery, "Delivery failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DELIVERY_ERROR",
                        delivery.to_string(),
                    )
                }
                other => {
                    tracing::error!(error = %other, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = match errors {
            Some(items) => json!({ "error": message, "code": code, "errors": items }),
            None => json!({ "error": message, "code": code }),
        };

        (status, axum::Json(body)).into_response()
    }
}
