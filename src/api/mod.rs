//! HTTP surface. Every dataset, dashboard and file route requires a session;
//! the `auth` routes are the only public ones besides `/health`.

mod auth;
mod dashboards;
mod datasets;
mod files;

pub use auth::{CurrentUser, MaybeUser};

use crate::blob_store::BlobStore;
use crate::error::ApiError;
use crate::services::{DashboardService, DatasetService};
use crate::sessions::SessionStore;
use crate::storage::TableStore;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::Path,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const PATH_HEALTH: &str = "/health";
pub const PATH_AUTH_CALLBACK: &str = "/api/auth/callback";
pub const PATH_AUTH_ME: &str = "/api/auth/me";
pub const PATH_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const PATH_DATASETS: &str = "/api/datasets";
pub const PATH_DATASET: &str = "/api/datasets/:id";
pub const PATH_DASHBOARDS: &str = "/api/dashboards";
pub const PATH_DASHBOARD: &str = "/api/dashboards/:id";
pub const PATH_FILES: &str = "/files";

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Bearer secret the identity broker presents on the sign-in callback.
    pub identity_secret: String,
    /// External identity that is always stored as an admin.
    pub owner_open_id: Option<String>,
}

pub struct AppState {
    pub store: Arc<TableStore>,
    pub datasets: DatasetService,
    pub dashboards: DashboardService,
    pub sessions: SessionStore,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(store: Arc<TableStore>, blobs: Arc<dyn BlobStore>, auth: AuthSettings) -> Self {
        Self {
            datasets: DatasetService::new(store.clone(), blobs),
            dashboards: DashboardService::new(store.clone()),
            sessions: SessionStore::new(),
            store,
            auth,
        }
    }
}

/// Builds the application router. When `files_dir` is set, stored blobs are
/// served read-only under `/files`, each only to the user who uploaded it.
pub fn router(state: Arc<AppState>, files_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route(PATH_HEALTH, get(health))
        .route(PATH_AUTH_CALLBACK, post(auth::identity_callback))
        .route(PATH_AUTH_ME, get(auth::me))
        .route(PATH_AUTH_LOGOUT, post(auth::logout))
        .route(
            PATH_DATASETS,
            post(datasets::upload).get(datasets::list),
        )
        .route(
            PATH_DATASET,
            get(datasets::get_by_id).delete(datasets::delete),
        )
        .route(
            PATH_DASHBOARDS,
            post(dashboards::create).get(dashboards::list),
        )
        .route(
            PATH_DASHBOARD,
            get(dashboards::get_by_id)
                .put(dashboards::update)
                .delete(dashboards::delete),
        )
        .with_state(state.clone());

    if let Some(dir) = files_dir {
        let files = Router::new()
            .nest_service(PATH_FILES, ServeDir::new(dir))
            .layer(middleware::from_fn_with_state(state, files::require_blob_owner));
        router = router.merge(files);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Unwraps a JSON body, turning shape errors into a 400 with the usual
/// error envelope.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
