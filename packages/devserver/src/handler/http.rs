//! HTTP API endpoint handlers.
//!
//! Staff sessions travel in httpOnly cookies (the refresh cookie is scoped to
//! the refresh endpoint). Portal sessions use a bearer access token and a
//! refresh token posted in the body.

use std::sync::{Arc, atomic::Ordering};

use axum::{
    Json,
    extract::State,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    },
    response::{AppendHeaders, IntoResponse, Response},
};
use jetty_shared::time::timestamp_to_rfc3339;
use serde::Deserialize;

use crate::{
    error::ApiError,
    state::{AppState, Realm, TokenResponse},
};

pub const STAFF_ACCESS_COOKIE: &str = "ssmspl_access_token";
pub const STAFF_REFRESH_COOKIE: &str = "ssmspl_refresh_token";
const STAFF_REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Debug, Deserialize)]
pub struct StaffLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PortalLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn staff_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StaffLoginRequest>,
) -> Result<Response, ApiError> {
    if body.username != state.config.staff_username || body.password != state.config.staff_password
    {
        tracing::warn!("Rejected staff login for '{}'", body.username);
        return Err(ApiError::Unauthorized("Invalid username or password"));
    }

    let tokens = state
        .staff_sessions
        .lock()
        .await
        .issue(&body.username, state.now_millis());
    tracing::info!("Staff '{}' logged in", body.username);

    Ok(staff_session_response(tokens))
}

pub async fn staff_refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    begin_refresh(&state, Realm::Staff).await?;

    let refresh_token = cookie(&headers, STAFF_REFRESH_COOKIE)
        .ok_or(ApiError::Unauthorized("Missing refresh token"))?;
    let tokens = state
        .staff_sessions
        .lock()
        .await
        .rotate(refresh_token, state.now_millis())
        .ok_or(ApiError::Unauthorized("Invalid or expired refresh token"))?;
    tracing::info!("Staff session refreshed");

    Ok(staff_session_response(tokens))
}

pub async fn staff_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (username, issued_at) =
        authenticate(&state, Realm::Staff, cookie(&headers, STAFF_ACCESS_COOKIE)).await?;

    Ok(Json(serde_json::json!({
        "username": username,
        "role": "admin",
        "session_started_at": timestamp_to_rfc3339(issued_at),
    })))
}

pub async fn staff_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    state.staff_sessions.lock().await.revoke(
        cookie(&headers, STAFF_ACCESS_COOKIE),
        cookie(&headers, STAFF_REFRESH_COOKIE),
    );

    let expired = AppendHeaders([
        (SET_COOKIE, format!("{}=; HttpOnly; Path=/; Max-Age=0", STAFF_ACCESS_COOKIE)),
        (
            SET_COOKIE,
            format!(
                "{}=; HttpOnly; Path={}; Max-Age=0",
                STAFF_REFRESH_COOKIE, STAFF_REFRESH_PATH
            ),
        ),
    ]);
    (
        expired,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    )
        .into_response()
}

pub async fn portal_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PortalLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if body.email != state.config.customer_email || body.password != state.config.customer_password
    {
        tracing::warn!("Rejected portal login for '{}'", body.email);
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }

    let tokens = state
        .portal_sessions
        .lock()
        .await
        .issue(&body.email, state.now_millis());
    tracing::info!("Customer '{}' logged in", body.email);

    Ok(Json(tokens))
}

pub async fn portal_refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    begin_refresh(&state, Realm::Portal).await?;

    let tokens = state
        .portal_sessions
        .lock()
        .await
        .rotate(&body.refresh_token, state.now_millis())
        .ok_or(ApiError::Unauthorized("Invalid or expired refresh token"))?;
    tracing::info!("Portal session refreshed");

    Ok(Json(tokens))
}

pub async fn portal_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (email, issued_at) = authenticate(&state, Realm::Portal, bearer(&headers)).await?;

    Ok(Json(serde_json::json!({
        "email": email,
        "session_started_at": timestamp_to_rfc3339(issued_at),
    })))
}

pub async fn portal_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    state
        .portal_sessions
        .lock()
        .await
        .revoke(bearer(&headers), None);
    Json(serde_json::json!({"message": "Logged out successfully"}))
}

/// Back-office resource guarded by the staff cookie
pub async fn list_branches(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&state, Realm::Staff, cookie(&headers, STAFF_ACCESS_COOKIE)).await?;

    Ok(Json(serde_json::json!([
        {"id": 1, "name": "Main Jetty", "is_active": true},
        {"id": 2, "name": "North Pier", "is_active": true},
    ])))
}

/// Portal resource guarded by the bearer token
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (email, _) = authenticate(&state, Realm::Portal, bearer(&headers)).await?;

    Ok(Json(serde_json::json!([
        {"id": 101, "customer": email, "route": "Main Jetty - North Pier", "status": "confirmed"},
    ])))
}

/// Count the call, apply the configured latency and honour the refresh switch
async fn begin_refresh(state: &AppState, realm: Realm) -> Result<(), ApiError> {
    let calls = state.refresh_calls(realm).fetch_add(1, Ordering::SeqCst) + 1;
    tracing::debug!("{:?} refresh call #{}", realm, calls);

    if !state.config.refresh_delay.is_zero() {
        tokio::time::sleep(state.config.refresh_delay).await;
    }
    if !state.is_refresh_enabled() {
        return Err(ApiError::Unauthorized("Session refresh is disabled"));
    }
    Ok(())
}

pub(super) async fn authenticate(
    state: &AppState,
    realm: Realm,
    access_token: Option<&str>,
) -> Result<(String, i64), ApiError> {
    let access_token = access_token.ok_or(ApiError::Unauthorized("Not authenticated"))?;
    state
        .sessions(realm)
        .lock()
        .await
        .authenticate(access_token, state.now_millis(), state.access_ttl_millis())
        .ok_or(ApiError::Unauthorized("Access token expired"))
}

fn staff_session_response(tokens: TokenResponse) -> Response {
    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            format!(
                "{}={}; HttpOnly; Path=/; SameSite=Lax",
                STAFF_ACCESS_COOKIE, tokens.access_token
            ),
        ),
        (
            SET_COOKIE,
            format!(
                "{}={}; HttpOnly; Path={}; SameSite=Lax",
                STAFF_REFRESH_COOKIE, tokens.refresh_token, STAFF_REFRESH_PATH
            ),
        ),
    ]);
    (cookies, Json(tokens)).into_response()
}

/// Value of a request cookie
pub(super) fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_finds_named_value() {
        // テスト項目: Cookie ヘッダーから指定した名前の値を取り出せる
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; ssmspl_access_token=abc; lang=en"),
        );

        // when (操作):
        let value = cookie(&headers, STAFF_ACCESS_COOKIE);

        // then (期待する結果):
        assert_eq!(value, Some("abc"));
        assert_eq!(cookie(&headers, STAFF_REFRESH_COOKIE), None);
    }

    #[test]
    fn test_bearer_requires_scheme() {
        // テスト項目: Bearer スキームのときだけトークンとして扱う
        // given (前提条件):
        let mut with_scheme = HeaderMap::new();
        with_scheme.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token-1"));
        let mut without_scheme = HeaderMap::new();
        without_scheme.insert(AUTHORIZATION, HeaderValue::from_static("token-1"));

        // when (操作):
        let results = (bearer(&with_scheme), bearer(&without_scheme));

        // then (期待する結果):
        assert_eq!(results, (Some("token-1"), None));
    }
}
