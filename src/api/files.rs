use super::CurrentUser;
use crate::error::ApiError;
use axum::{extract::Request, middleware::Next, response::Response};

/// Only lets a caller fetch blobs stored under their own
/// `datasets/{user_id}/` prefix. Accepts the path with or without the
/// `/files` mount point.
pub async fn require_blob_owner(
    CurrentUser(user): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !owns_blob_path(request.uri().path(), user.id) {
        tracing::warn!(user_id = user.id, path = request.uri().path(), "blob access denied");
        return Err(ApiError::forbidden("You don't have access to this file"));
    }
    Ok(next.run(request).await)
}

fn owns_blob_path(path: &str, user_id: i64) -> bool {
    let lowered = path.to_ascii_lowercase();
    if ["%2e", "%2f", "%5c"].iter().any(|encoded| lowered.contains(encoded)) {
        return false;
    }
    let path = path.trim_start_matches('/');
    let path = path.strip_prefix("files/").unwrap_or(path);
    let mut segments = path.split('/');
    let owner = user_id.to_string();
    if segments.next() != Some("datasets")
        || segments.next() != Some(owner.as_str())
    {
        return false;
    }
    let rest: Vec<&str> = segments.collect();
    !rest.is_empty() && rest.iter().all(|s| !s.is_empty() && *s != "." && *s != "..")
}
