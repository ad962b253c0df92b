use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::core::publish::ValidationError;
use crate::core::refresh::JoinError;
use crate::core::store::StoreError;
use crate::core::worker::WorkerError;

/// Every failure a handler can surface, with its HTTP mapping.
#[derive(Debug)]
pub(crate) enum ApiError {
    Validation(ValidationError),
    Worker(WorkerError),
    Join(JoinError),
    Store(StoreError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<WorkerError> for ApiError {
    fn from(e: WorkerError) -> Self {
        ApiError::Worker(e)
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        ApiError::Join(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::new(
            "body",
            format!("request body must be a JSON object: {}", rejection.body_text()),
        ))
    }
}

fn worker_status(e: &WorkerError) -> StatusCode {
    match e {
        WorkerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        WorkerError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        WorkerError::Launch { .. }
        | WorkerError::Exit { .. }
        | WorkerError::Extraction { .. }
        | WorkerError::Reported { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::UnknownSource(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) | StoreError::ScheduledNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Malformed(_) | StoreError::Io { .. } | StoreError::Json { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": e.message,
                    "field": e.field,
                })),
            )
                .into_response(),
            ApiError::Worker(e) => {
                let status = worker_status(&e);
                error!(status = status.as_u16(), "{}", e);
                (
                    status,
                    Json(json!({
                        "success": false,
                        "error": e.summary(),
                        "details": e.diagnostics(),
                    })),
                )
                    .into_response()
            }
            ApiError::Join(e) => {
                error!("{}", e);
                let failures: Vec<_> = e
                    .failures
                    .iter()
                    .map(|f| {
                        json!({
                            "source": f.source,
                            "error": f.error,
                            "details": f.details,
                        })
                    })
                    .collect();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": e.to_string(),
                        "errors": e.messages(),
                        "failures": failures,
                    })),
                )
                    .into_response()
            }
            ApiError::Store(e) => {
                let status = store_status(&e);
                if status.is_server_error() {
                    error!("{}", e);
                } else {
                    warn!("{}", e);
                }
                (
                    status,
                    Json(json!({
                        "success": false,
                        "error": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}
