// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for system management.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    models::{Transaction, Wallet},
    state::AppState,
    storage::{AuditEvent, AuditEventType, FinancialTotals, LedgerCounts},
};

use super::users::UserResponse;

const DEFAULT_AUDIT_LIMIT: usize = 100;
const DASHBOARD_AUDIT_ROWS: usize = 10;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub counts: LedgerCounts,
    /// Most recent audit entries, newest first.
    pub recent_activity: Vec<AuditEvent>,
}

/// A user row annotated with its wallet count, for the admin listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserRow {
    #[serde(flatten)]
    pub user: UserResponse,
    pub wallet_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub counts: LedgerCounts,
    pub totals: FinancialTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReapResponse {
    /// Number of expired sessions deleted.
    pub reaped: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLimitQuery {
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/v1/admin/dashboard",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = DashboardResponse))
)]
pub async fn dashboard(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    audit_log!(state, AuditEventType::AdminAccess, admin);
    Ok(Json(DashboardResponse {
        counts: state.store.counts()?,
        recent_activity: state.store.list_audit_events(DASHBOARD_AUDIT_ROWS)?,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [AdminUserRow]))
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminUserRow>>, ApiError> {
    let users = state.store.list_users()?;
    let mut rows = Vec::with_capacity(users.len());
    for user in &users {
        rows.push(AdminUserRow {
            user: UserResponse::from(user),
            wallet_count: state.store.list_wallets(user.id)?.len(),
        });
    }
    Ok(Json(rows))
}

/// Every wallet row, active and soft-deleted alike.
#[utoipa::path(
    get,
    path = "/v1/admin/wallets",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [Wallet]))
)]
pub async fn list_wallets(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<Wallet>>, ApiError> {
    Ok(Json(state.store.list_all_wallets()?))
}

#[utoipa::path(
    get,
    path = "/v1/admin/transactions",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [Transaction]))
)]
pub async fn list_transactions(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.store.list_all_transactions(usize::MAX)?))
}

#[utoipa::path(
    get,
    path = "/v1/admin/audit-logs",
    params(AuditLimitQuery),
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [AuditEvent]))
)]
pub async fn audit_logs(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<AuditLimitQuery>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Ok(Json(state.store.list_audit_events(limit)?))
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/toggle-status",
    params(("user_id" = u64, Path, description = "User whose active flag to flip")),
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn toggle_status(
    AdminOnly(admin): AdminOnly,
    Path(user_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("Cannot deactivate your own account"));
    }
    let current = state.store.get_user(user_id)?;
    let updated = state.store.set_user_active(user_id, !current.is_active)?;
    audit_log!(
        state,
        AuditEventType::UserStatusChanged,
        admin,
        "user",
        user_id.to_string()
    );
    Ok(Json(UserResponse::from(&updated)))
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{user_id}/toggle-admin",
    params(("user_id" = u64, Path, description = "User whose admin flag to flip")),
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn toggle_admin(
    AdminOnly(admin): AdminOnly,
    Path(user_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("Cannot demote your own account"));
    }
    let current = state.store.get_user(user_id)?;
    let updated = state.store.set_user_admin(user_id, !current.is_admin)?;
    audit_log!(
        state,
        AuditEventType::UserRoleChanged,
        admin,
        "user",
        user_id.to_string()
    );
    Ok(Json(UserResponse::from(&updated)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = StatsResponse))
)]
pub async fn stats(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(StatsResponse {
        counts: state.store.counts()?,
        totals: state.store.financial_totals()?,
    }))
}

/// Purge every session whose expiry is in the past. There is no
/// background reaper; this is the only purge path.
#[utoipa::path(
    post,
    path = "/v1/admin/sessions/reap",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = ReapResponse))
)]
pub async fn reap_sessions(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<ReapResponse>, ApiError> {
    let reaped = state.store.delete_expired_sessions(Utc::now())?;
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::SessionsReaped)
            .with_user(admin.user_id)
            .with_details(serde_json::json!({ "reaped": reaped }))
    );
    Ok(Json(ReapResponse { reaped }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::models::Session;
    use crate::state::tests::temp_state;
    use chrono::Duration;
    use rust_decimal_macros::dec;

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
    async fn dashboard_counts_and_recent_activity() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);
        state
            .store
            .create_wallet_with_balance(user.user_id, "W", "USD", dec!(10.00))
            .unwrap();

        let Json(body) = dashboard(AdminOnly(admin), State(state)).await.unwrap();
        assert_eq!(body.counts.users, 2);
        assert_eq!(body.counts.wallets, 1);
        // The dashboard access itself was audited.
        assert!(!body.recent_activity.is_empty());
    }

    #[tokio::test]
    async fn toggle_admin_flips_and_refuses_self() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);

        let Json(row) = toggle_admin(
            AdminOnly(admin.clone()),
            Path(user.user_id),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert!(row.is_admin);

        let err = toggle_admin(AdminOnly(admin.clone()), Path(admin.user_id), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reap_deletes_only_expired_sessions() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);
        let now = Utc::now();
        state
            .store
            .put_session(&Session {
                token: "expired".to_string(),
                user_id: user.user_id,
                expires_at: now - Duration::minutes(1),
                created_at: now - Duration::hours(1),
            })
            .unwrap();
        state
            .store
            .put_session(&Session {
                token: "live".to_string(),
                user_id: user.user_id,
                expires_at: now + Duration::minutes(30),
                created_at: now,
            })
            .unwrap();

        let Json(body) = reap_sessions(AdminOnly(admin), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(body.reaped, 1);
        assert!(state.store.get_session("live").unwrap().is_some());
        assert!(state.store.get_session("expired").unwrap().is_none());
    }

    #[tokio::test]
    async fn user_listing_carries_wallet_counts() {
        let (state, _dir) = temp_state();
        let (admin, user) = seeded(&state);
        state
            .store
            .create_wallet(user.user_id, "W1", "USD")
            .unwrap();
        state
            .store
            .create_wallet(user.user_id, "W2", "USD")
            .unwrap();

        let Json(rows) = list_users(AdminOnly(admin), State(state)).await.unwrap();
        let alice = rows.iter().find(|r| r.user.username == "alice").unwrap();
        assert_eq!(alice.wallet_count, 2);
    }
}
