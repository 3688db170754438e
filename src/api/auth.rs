// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, and session lifecycle endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::{password, sessions, Auth},
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

use super::users::UserResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Opaque bearer token for the Authorization header.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, body = UserResponse),
        (status = 400, description = "Username or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_registration(&request)?;

    let hash = password::hash_password(&request.password);
    let user = state
        .store
        .insert_user(&request.username, &request.email, &hash, false)?;

    audit_log!(
        state,
        AuditEvent::new(AuditEventType::UserRegistered)
            .with_user(user.id)
            .with_resource("user", user.id.to_string())
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Bad credentials or deactivated account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .store
        .get_user_by_username(&request.username)?
        .filter(|u| password::verify_password(&request.password, &u.password_hash));

    let Some(user) = user else {
        audit_log!(
            state,
            AuditEvent::new(AuditEventType::UserLoginFailed)
                .with_details(serde_json::json!({ "username": request.username }))
                .failed("Invalid username or password")
        );
        return Err(ApiError::unauthorized("Invalid username or password"));
    };
    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    let session =
        sessions::create_session(&state.store, user.id, state.config.session_ttl_minutes)?;
    audit_log!(state, AuditEvent::new(AuditEventType::UserLogin).with_user(user.id));

    Ok(Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: UserResponse::from(&user),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, body = LogoutResponse))
)]
pub async fn logout(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    if let Some(token) = bearer_header(&headers) {
        state.store.delete_session(token)?;
    }
    audit_log!(state, AuditEventType::UserLogout, user);
    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let row = state.store.get_user(user.user_id)?;
    Ok(Json(UserResponse::from(&row)))
}

/// Slide the current session's expiry forward by one TTL.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, body = SessionResponse))
)]
pub async fn refresh(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token =
        bearer_header(&headers).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let mut session = state
        .store
        .get_session(token)?
        .ok_or_else(|| ApiError::unauthorized("Session no longer exists"))?;
    session.expires_at = Utc::now() + Duration::minutes(state.config.session_ttl_minutes);
    state.store.put_session(&session)?;

    let row = state.store.get_user(user.user_id)?;
    Ok(Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: UserResponse::from(&row),
    }))
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    if request.username.trim().len() < 3 {
        return Err(ApiError::bad_request(
            "Username must be at least 3 characters",
        ));
    }
    if !request.email.contains('@') {
        return Err(ApiError::bad_request("Email address is not valid"));
    }
    if request.password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
