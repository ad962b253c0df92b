use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;

use super::super::AppState;
use super::super::error::ApiError;
use super::{CredentialBody, request_scope};
use crate::core::publish::request::require_credential;

/// Answers `{valid, message}` or `{valid: false, error}` as the token worker
/// reports it.
pub async fn validate_token_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<CredentialBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let credential = require_credential(body.credential)?;

    let (cancel, _guard) = request_scope();
    let result = state.publisher.validate_token(&credential, cancel).await?;
    Ok(Json(result))
}
