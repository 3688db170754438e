// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo data and snapshot management endpoints.
//!
//! Most of this surface is admin-only. The bootstrap endpoints
//! (`setup-fresh`, `create-admin`, `make-admin`) are deliberately
//! unauthenticated so a freshly wiped training instance can be brought
//! back without an existing session; that openness is part of the
//! training material.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    snapshot::{SeedReport, SnapshotDocument, SnapshotInfo, SnapshotManager},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

use super::users::UserResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SnapshotQuery {
    /// Version label, e.g. `v1` or `2026-08-29`.
    pub version: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RestoreQuery {
    /// Wipe the ledger before re-inserting the snapshot rows.
    pub clear_existing: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAdminResponse {
    /// False when the admin account already existed.
    pub created: bool,
    pub username: String,
}

#[utoipa::path(
    post,
    path = "/v1/data/demo-data",
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 201, body = SeedReport))
)]
pub async fn seed_demo_data(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SeedReport>), ApiError> {
    let report = state.snapshots.seed_demo_data()?;
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::DemoDataSeeded).with_user(admin.user_id)
    );
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    post,
    path = "/v1/data/snapshot",
    params(SnapshotQuery),
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 201, body = SnapshotDocument))
)]
pub async fn create_snapshot(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<(StatusCode, Json<SnapshotDocument>), ApiError> {
    let description = query.description.as_deref().unwrap_or("");
    let document = state.snapshots.create_snapshot(&query.version, description)?;
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::SnapshotCreated)
            .with_user(admin.user_id)
            .with_resource("snapshot", query.version.clone())
    );
    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    get,
    path = "/v1/data/snapshots",
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 200, body = [SnapshotInfo]))
)]
pub async fn list_snapshots(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<SnapshotInfo>>, ApiError> {
    Ok(Json(state.snapshots.list_snapshots()?))
}

#[utoipa::path(
    get,
    path = "/v1/data/snapshot/{version}",
    params(("version" = String, Path, description = "Snapshot version label")),
    tag = "Data",
    security(("bearer" = [])),
    responses(
        (status = 200, body = SnapshotDocument),
        (status = 404, description = "No snapshot with that version")
    )
)]
pub async fn get_snapshot(
    AdminOnly(_admin): AdminOnly,
    Path(version): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SnapshotDocument>, ApiError> {
    Ok(Json(state.snapshots.load_snapshot(&version)?))
}

#[utoipa::path(
    post,
    path = "/v1/data/snapshot/{version}/restore",
    params(
        ("version" = String, Path, description = "Snapshot version label"),
        RestoreQuery
    ),
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse))
)]
pub async fn restore_snapshot(
    AdminOnly(admin): AdminOnly,
    Path(version): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<RestoreQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let clear_existing = query.clear_existing.unwrap_or(true);
    state.snapshots.restore_snapshot(&version, clear_existing)?;
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::SnapshotRestored)
            .with_user(admin.user_id)
            .with_resource("snapshot", version.clone())
    );
    Ok(Json(MessageResponse {
        message: format!("Snapshot '{version}' restored"),
    }))
}

/// Delete every ledger row and reset the id counters. Snapshot files
/// are untouched.
#[utoipa::path(
    delete,
    path = "/v1/data/clear-data",
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse))
)]
pub async fn clear_data(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.snapshots.wipe_all()?;
    // The wipe removed the audit table too; the file mirror keeps the trail.
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::DataWiped).with_user(admin.user_id)
    );
    Ok(Json(MessageResponse {
        message: "All data cleared".to_string(),
    }))
}

/// The demo fixture's credential map, for the training UI.
#[utoipa::path(
    get,
    path = "/v1/data/credentials",
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 200, description = "Username to password map"))
)]
pub async fn credentials(
    AdminOnly(_admin): AdminOnly,
) -> Json<BTreeMap<String, String>> {
    Json(SnapshotManager::demo_credentials())
}

/// Wipe and reseed in one call, without auth. Bootstrap path for a
/// fresh training instance.
#[utoipa::path(
    post,
    path = "/v1/data/setup-fresh",
    tag = "Data",
    responses((status = 201, body = SeedReport))
)]
pub async fn setup_fresh(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SeedReport>), ApiError> {
    let report = state.snapshots.seed_demo_data()?;
    audit_log!(state, AuditEvent::new(AuditEventType::DemoDataSeeded));
    Ok((StatusCode::CREATED, Json(report)))
}

/// Create the configured admin account if it does not exist yet.
#[utoipa::path(
    post,
    path = "/v1/data/create-admin",
    tag = "Data",
    responses((status = 200, body = CreateAdminResponse))
)]
pub async fn create_admin(
    State(state): State<AppState>,
) -> Result<Json<CreateAdminResponse>, ApiError> {
    let created = state.snapshots.bootstrap_admin(&state.config)?;
    Ok(Json(CreateAdminResponse {
        created,
        username: state.config.admin_username.clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/data/reset-demo",
    tag = "Data",
    security(("bearer" = [])),
    responses((status = 201, body = SeedReport))
)]
pub async fn reset_demo(
    admin: AdminOnly,
    state: State<AppState>,
) -> Result<(StatusCode, Json<SeedReport>), ApiError> {
    seed_demo_data(admin, state).await
}

/// Promote an existing user to admin by username, without auth. Part of
/// the training surface.
#[utoipa::path(
    post,
    path = "/v1/data/make-admin/{username}",
    params(("username" = String, Path, description = "User to promote")),
    tag = "Data",
    responses((status = 200, body = UserResponse))
)]
pub async fn make_admin(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.snapshots.promote_to_admin(&username)?;
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::UserRoleChanged)
            .with_resource("user", user.id.to_string())
    );
    Ok(Json(UserResponse::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::tests::temp_state;

    fn admin(state: &AppState) -> AuthenticatedUser {
        let row = state
            .store
            .insert_user("root", "root@example.com", "h", true)
            .unwrap();
        AuthenticatedUser::from(&row)
    }

    #[tokio::test]
    async fn snapshot_roundtrip_through_the_api() {
        let (state, _dir) = temp_state();
        let admin = admin(&state);
        state
            .store
            .create_wallet(admin.user_id, "W", "USD")
            .unwrap();

        let (status, Json(document)) = create_snapshot(
            AdminOnly(admin.clone()),
            State(state.clone()),
            Query(SnapshotQuery {
                version: "v1".to_string(),
                description: Some("before".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(document.data.wallets.len(), 1);

        let Json(listed) = list_snapshots(AdminOnly(admin.clone()), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, "v1");

        // Wipe, restore, and the wallet is back.
        clear_data(AdminOnly(admin.clone()), State(state.clone()))
            .await
            .unwrap();
        assert!(state.store.list_all_wallets().unwrap().is_empty());

        restore_snapshot(
            AdminOnly(admin.clone()),
            Path("v1".to_string()),
            State(state.clone()),
            Query(RestoreQuery {
                clear_existing: Some(true),
            }),
        )
        .await
        .unwrap();
        assert_eq!(state.store.list_all_wallets().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_snapshot_is_404() {
        let (state, _dir) = temp_state();
        let admin = admin(&state);
        let err = get_snapshot(
            AdminOnly(admin),
            Path("nope".to_string()),
            State(state),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn setup_fresh_seeds_without_auth() {
        let (state, _dir) = temp_state();
        let (status, Json(report)) = setup_fresh(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(report.users, 5);
        assert_eq!(report.wallets, 5);
        assert!(state
            .store
            .get_user_by_username("admin")
            .unwrap()
            .unwrap()
            .is_admin);
    }

    #[tokio::test]
    async fn make_admin_promotes_by_username() {
        let (state, _dir) = temp_state();
        state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();

        let Json(user) = make_admin(Path("alice".to_string()), State(state))
            .await
            .unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn create_admin_is_idempotent() {
        let (state, _dir) = temp_state();
        let Json(first) = create_admin(State(state.clone())).await.unwrap();
        assert!(first.created);
        let Json(second) = create_admin(State(state)).await.unwrap();
        assert!(!second.created);
    }
}
