use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use tracing::info;

use super::super::AppState;
use super::super::error::ApiError;
use super::request_scope;
use crate::core::publish::{ContentKind, Mode, PublishBody, ValidationError};

fn content_kind(segment: &str) -> Result<ContentKind, ApiError> {
    ContentKind::from_path(segment).ok_or_else(|| {
        ApiError::Validation(ValidationError::new(
            "kind",
            format!(
                "unknown content type '{segment}'; expected image, video, story, carousel or mixed-carousel"
            ),
        ))
    })
}

async fn dispatch(
    state: &AppState,
    segment: &str,
    mode: Mode,
    payload: Result<Json<PublishBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let kind = content_kind(segment)?;
    let Json(body) = payload?;
    let request = body.validate(kind, mode)?;

    let (cancel, _guard) = request_scope();
    let outcome = state.publisher.publish(request, cancel).await?;
    info!(
        kind = kind.as_str(),
        worker = outcome.worker.name(),
        id = outcome.id.as_deref().unwrap_or("-"),
        "Publish request completed"
    );

    let mut response = json!({
        "success": true,
        "id": outcome.id,
        "result": outcome.result,
    });
    if let Some(at) = outcome.scheduled_time {
        response["scheduled_time"] = json!(at);
    }
    Ok(Json(response))
}

pub async fn publish_endpoint(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<PublishBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&state, &kind, Mode::Immediate, payload).await
}

pub async fn schedule_endpoint(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    payload: Result<Json<PublishBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&state, &kind, Mode::Scheduled, payload).await
}

pub async fn list_scheduled_endpoint(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let items = state.store.scheduled_items().await?;
    Ok(Json(Value::Array(items)))
}

pub async fn delete_scheduled_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.store.remove_scheduled(id.trim()).await?;
    Ok(Json(json!({
        "success": true,
        "removed": removed,
    })))
}
