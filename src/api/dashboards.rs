use super::{json_body, path_id, AppState, CurrentUser};
use crate::error::ApiError;
use crate::models::{
    CreateDashboardRequest, CreateDashboardResponse, Dashboard, DashboardWithDataset,
    SuccessResponse, UpdateDashboardRequest,
};
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

/// Handler for POST /api/dashboards - dashboard.create
#[tracing::instrument(
    name = "handler_create_dashboard",
    skip_all,
    fields(user_id = user.0.id)
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Result<Json<CreateDashboardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateDashboardResponse>), ApiError> {
    let request = json_body(payload)?;
    let response = state.dashboards.create(user.0.id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/dashboards - dashboard.list
#[tracing::instrument(name = "handler_list_dashboards", skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Dashboard>>, ApiError> {
    Ok(Json(state.dashboards.list(user.id).await?))
}

/// Handler for GET /api/dashboards/:id - dashboard.getById
#[tracing::instrument(name = "handler_get_dashboard", skip_all)]
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DashboardWithDataset>, ApiError> {
    let id = path_id(id)?;
    Ok(Json(state.dashboards.get_by_id(id, user.id).await?))
}

/// Handler for PUT /api/dashboards/:id - dashboard.update
#[tracing::instrument(name = "handler_update_dashboard", skip_all)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateDashboardRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = path_id(id)?;
    let request = json_body(payload)?;
    state.dashboards.update(id, user.id, request.config).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for DELETE /api/dashboards/:id - dashboard.delete
#[tracing::instrument(name = "handler_delete_dashboard", skip_all)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = path_id(id)?;
    state.dashboards.delete(id, user.id).await?;
    Ok(Json(SuccessResponse::ok()))
}
