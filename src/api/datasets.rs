use super::{json_body, path_id, AppState, CurrentUser};
use crate::error::ApiError;
use crate::models::{
    Dataset, DatasetWithUrl, SuccessResponse, UploadDatasetRequest, UploadDatasetResponse,
};
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

/// Handler for POST /api/datasets - dataset.upload
#[tracing::instrument(
    name = "handler_upload_dataset",
    skip_all,
    fields(user_id = user.0.id)
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Result<Json<UploadDatasetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UploadDatasetResponse>), ApiError> {
    let request = json_body(payload)?;
    let response = state.datasets.upload(user.0.id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/datasets - dataset.list
#[tracing::instrument(name = "handler_list_datasets", skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Dataset>>, ApiError> {
    Ok(Json(state.datasets.list(user.id).await?))
}

/// Handler for GET /api/datasets/:id - dataset.getById
#[tracing::instrument(name = "handler_get_dataset", skip_all)]
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DatasetWithUrl>, ApiError> {
    let id = path_id(id)?;
    Ok(Json(state.datasets.get_by_id(id, user.id).await?))
}

/// Handler for DELETE /api/datasets/:id - dataset.delete
#[tracing::instrument(name = "handler_delete_dataset", skip_all)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = path_id(id)?;
    state.datasets.delete(id, user.id).await?;
    Ok(Json(SuccessResponse::ok()))
}
