use super::{json_body, AppState};
use crate::error::ApiError;
use crate::models::SuccessResponse;
use crate::sessions::{expired_session_cookie, session_cookie, token_from_cookie_header};
use crate::user_models::{IdentityProfile, SignInResponse, User};
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderName},
    Json,
};
use std::sync::Arc;

/// The signed-in caller. Rejects with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The caller, if signed in. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(token_from_cookie_header)
    })
}

async fn resolve_user(headers: &HeaderMap, state: &AppState) -> Result<Option<User>, ApiError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    let Some(user_id) = state.sessions.resolve(token).await else {
        return Ok(None);
    };
    Ok(state.store.get_user(user_id).await?)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(&parts.headers, state)
            .await?
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Please sign in"))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(&parts.headers, state).await?))
    }
}

/// Compares in time independent of where the inputs first differ.
fn secrets_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Handler for POST /api/auth/callback - called by the identity broker once
/// it has verified an external identity.
#[tracing::instrument(name = "handler_identity_callback", skip_all)]
pub async fn identity_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<IdentityProfile>, JsonRejection>,
) -> Result<([(HeaderName, String); 1], Json<SignInResponse>), ApiError> {
    let presented = bearer_token(&headers).unwrap_or_default();
    if !secrets_match(presented, &state.auth.identity_secret) {
        tracing::warn!("identity callback with missing or wrong secret");
        return Err(ApiError::unauthorized("Invalid identity broker credentials"));
    }
    let profile = json_body(payload)?;
    if profile.open_id.trim().is_empty() {
        return Err(ApiError::bad_request("openId is required"));
    }

    let user = state
        .store
        .upsert_user(profile, state.auth.owner_open_id.as_deref())
        .await?;
    let token = state.sessions.open(user.id).await;
    tracing::info!(user_id = user.id, role = ?user.role, "user signed in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Json(SignInResponse { token, user }),
    ))
}

/// Handler for GET /api/auth/me
#[tracing::instrument(name = "handler_me", skip_all)]
pub async fn me(MaybeUser(user): MaybeUser) -> Json<Option<User>> {
    Json(user)
}

/// Handler for POST /api/auth/logout
#[tracing::instrument(name = "handler_logout", skip_all)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ([(HeaderName, String); 1], Json<SuccessResponse>) {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(token).await;
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(SuccessResponse::ok()),
    )
}
