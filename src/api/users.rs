// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profile and directory endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::{password, AdminOnly, Auth, AuthenticatedUser},
    error::ApiError,
    models::User,
    state::AppState,
    storage::{AuditEventType, UserUpdate},
};

/// Public projection of a [`User`] row. The password hash never leaves
/// the store through this type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Admin-only; a non-admin caller supplying this gets 403.
    pub is_admin: Option<bool>,
    /// Admin-only.
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Substring matched against usernames and emails.
    pub q: String,
}

const SEARCH_MIN_CHARS: usize = 2;
const SEARCH_LIMIT: usize = 10;

#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn get_me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let row = state.store.get_user(user.user_id)?;
    Ok(Json(UserResponse::from(&row)))
}

#[utoipa::path(
    put,
    path = "/v1/users/me",
    request_body = UpdateUserRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn update_me(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    apply_update(&state, &user, user.user_id, request)
}

#[utoipa::path(
    get,
    path = "/v1/users/search",
    params(SearchQuery),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [UserResponse]),
        (status = 400, description = "Query shorter than 2 characters")
    )
)]
pub async fn search(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let query = params.q.trim();
    if query.len() < SEARCH_MIN_CHARS {
        return Err(ApiError::bad_request(
            "Search query must be at least 2 characters",
        ));
    }
    let users = state.store.search_users(query, SEARCH_LIMIT)?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = [UserResponse]))
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.store.list_users()?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/users/{user_id}",
    params(("user_id" = u64, Path, description = "User to fetch")),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = UserResponse),
        (status = 403, description = "Not the owner and not an admin")
    )
)]
pub async fn get_user(
    Auth(user): Auth,
    Path(user_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    require_owner_or_admin(&user, user_id)?;
    let row = state.store.get_user(user_id)?;
    Ok(Json(UserResponse::from(&row)))
}

#[utoipa::path(
    put,
    path = "/v1/users/{user_id}",
    params(("user_id" = u64, Path, description = "User to update")),
    request_body = UpdateUserRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn update_user(
    Auth(user): Auth,
    Path(user_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_owner_or_admin(&user, user_id)?;
    apply_update(&state, &user, user_id, request)
}

/// Soft delete: the account is deactivated, not removed, so its wallets
/// and ledger history keep resolving.
#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}",
    params(("user_id" = u64, Path, description = "User to deactivate")),
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn delete_user(
    AdminOnly(admin): AdminOnly,
    Path(user_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let row = state.store.set_user_active(user_id, false)?;
    audit_log!(
        state,
        AuditEventType::UserStatusChanged,
        admin,
        "user",
        user_id.to_string()
    );
    Ok(Json(UserResponse::from(&row)))
}

fn require_owner_or_admin(caller: &AuthenticatedUser, user_id: u64) -> Result<(), ApiError> {
    if caller.user_id == user_id || caller.is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Not allowed to access this user"))
    }
}

fn apply_update(
    state: &AppState,
    caller: &AuthenticatedUser,
    user_id: u64,
    request: UpdateUserRequest,
) -> Result<Json<UserResponse>, ApiError> {
    if (request.is_admin.is_some() || request.is_active.is_some()) && !caller.is_admin {
        return Err(ApiError::forbidden(
            "Only an admin may change role or status flags",
        ));
    }
    if let Some(password) = &request.password {
        if password.len() < 6 {
            return Err(ApiError::bad_request(
                "Password must be at least 6 characters",
            ));
        }
    }

    let update = UserUpdate {
        username: request.username,
        email: request.email,
        password_hash: request.password.as_deref().map(password::hash_password),
        is_admin: request.is_admin,
        is_active: request.is_active,
    };
    let row = state.store.update_user(user_id, update)?;
    audit_log!(
        state,
        AuditEventType::UserUpdated,
        caller,
        "user",
        user_id.to_string()
    );
    Ok(Json(UserResponse::from(&row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::temp_state;

    fn seeded(state: &AppState) -> (AuthenticatedUser, AuthenticatedUser) {
        let admin = state
            .store
            .insert_user("root", "root@example.com", "h", true)
            .unwrap();
        let user = state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        (
            AuthenticatedUser::from(&admin),
            AuthenticatedUser::from(&user),
        )
    }

    #[tokio::test]
    async fn search_enforces_minimum_length() {
        let (state, _dir) = temp_state();
        let (_, user) = seeded(&state);

        let err = search(
            Auth(user.clone()),
            State(state.clone()),
            Query(SearchQuery { q: "a".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);

        let Json(hits) = search(
            Auth(user),
            State(state),
            Query(SearchQuery {
                q: "ali".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "alice");
    }

    #[tokio::test]
    async fn non_admin_cannot_read_other_users() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);

        let err = get_user(Auth(user.clone()), Path(admin.user_id), State(state.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);

        // The admin reads anyone.
        let Json(row) = get_user(Auth(admin), Path(user.user_id), State(state))
            .await
            .unwrap();
        assert_eq!(row.username, "alice");
    }

    #[tokio::test]
    async fn non_admin_cannot_self_promote() {
        let (state, _dir) = temp_state();
        let (_, user) = seeded(&state);

        let err = update_me(
            Auth(user),
            State(state),
            Json(UpdateUserRequest {
                username: None,
                email: None,
                password: None,
                is_admin: Some(true),
                is_active: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delete_is_soft() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);

        let Json(row) = delete_user(
            AdminOnly(admin),
            Path(user.user_id),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert!(!row.is_active);
        // Row is still resolvable.
        assert!(state.store.get_user(user.user_id).is_ok());
    }
}
