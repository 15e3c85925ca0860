use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::ingest::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Dataset,
    Dashboard,
}

impl Resource {
    fn noun(self) -> &'static str {
        match self {
            Resource::Dataset => "dataset",
            Resource::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Dataset => write!(f, "Dataset"),
            Resource::Dashboard => write!(f, "Dashboard"),
        }
    }
}

/// Failures surfaced by the dataset and dashboard services.
///
/// `NotFound` and `Forbidden` stay distinct: a caller can tell a missing id
/// from one owned by someone else.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("You don't have access to this {}", .0.noun())]
    Forbidden(Resource),
    #[error("Please sign in")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<IngestError> for ServiceError {
    fn from(e: IngestError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

/// API error with HTTP status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message,
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.code,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            ServiceError::Forbidden(_) => ApiError::forbidden(e.to_string()),
            ServiceError::Unauthorized => ApiError::unauthorized(e.to_string()),
            ServiceError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Infrastructure failures outside the services (identity upsert, sessions)
/// are opaque to the caller.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_distinct_statuses() {
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound(Resource::Dataset), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden(Resource::Dataset), StatusCode::FORBIDDEN),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ServiceError::Internal(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn messages_name_the_resource() {
        assert_eq!(
            ServiceError::NotFound(Resource::Dashboard).to_string(),
            "Dashboard not found"
        );
        assert_eq!(
            ServiceError::Forbidden(Resource::Dataset).to_string(),
            "You don't have access to this dataset"
        );
    }

    #[test]
    fn internal_cause_is_not_exposed() {
        let err = ApiError::from(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.message, "Internal server error");
    }
}
