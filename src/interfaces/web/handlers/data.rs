use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;

use super::super::AppState;
use super::super::error::ApiError;
use crate::core::store::DataSource;

pub async fn get_data_endpoint(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let source = DataSource::parse(&source)?;
    Ok(Json(state.store.read(source).await?))
}
