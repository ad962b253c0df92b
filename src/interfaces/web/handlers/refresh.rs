use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use super::super::AppState;
use super::super::error::ApiError;
use super::{CredentialBody, request_scope};
use crate::core::publish::request::require_credential;

/// Runs every refresh source and answers once all of them have settled.
pub async fn refresh_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<CredentialBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let credential = require_credential(body.credential)?;

    let (cancel, _guard) = request_scope();
    let summary = state.refresh.refresh(&credential, cancel).await?;
    Ok(Json(json!({
        "success": true,
        "sources": summary.sources,
    })))
}
