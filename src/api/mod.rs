// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface: the versioned API under `/v1`, health probes at the
//! root, and Swagger UI at `/docs`.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        SupportTicket, TicketCategory, TicketPriority, TicketStatus, Transaction,
        TransactionStatus, TransactionType, Wallet,
    },
    snapshot::{SeedReport, SnapshotDocument, SnapshotInfo},
    state::AppState,
    storage::{AuditEvent, AuditEventType, FinancialTotals, LedgerCounts},
};

pub mod admin;
pub mod auth;
pub mod data;
pub mod health;
pub mod support;
pub mod transactions;
pub mod users;
pub mod vuln;
pub mod wallets;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/refresh", post(auth::refresh))
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route("/users/search", get(users::search))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/wallets",
            post(wallets::create_wallet).get(wallets::list_wallets),
        )
        .route("/wallets/balance", get(wallets::total_balance))
        .route("/wallets/transfer", post(wallets::send_money))
        .route("/wallets/deposit", post(wallets::quick_deposit))
        .route("/wallets/withdraw", post(wallets::quick_withdraw))
        .route(
            "/wallets/{wallet_id}",
            get(wallets::get_wallet)
                .put(wallets::update_wallet)
                .delete(wallets::delete_wallet),
        )
        .route("/wallets/{wallet_id}/transfer", post(wallets::transfer))
        .route("/wallets/{wallet_id}/deposit", post(wallets::deposit))
        .route("/wallets/{wallet_id}/withdraw", post(wallets::withdraw))
        .route(
            "/wallets/{wallet_id}/transactions",
            get(wallets::wallet_transactions),
        )
        .route("/transactions", get(transactions::list_transactions))
        .route("/transactions/{tx_id}", get(transactions::get_transaction))
        .route("/support/ticket", post(support::create_ticket))
        .route("/support/tickets", get(support::list_tickets))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/wallets", get(admin::list_wallets))
        .route("/admin/transactions", get(admin::list_transactions))
        .route("/admin/audit-logs", get(admin::audit_logs))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/sessions/reap", post(admin::reap_sessions))
        .route(
            "/admin/users/{user_id}/toggle-status",
            post(admin::toggle_status),
        )
        .route(
            "/admin/users/{user_id}/toggle-admin",
            post(admin::toggle_admin),
        )
        .route("/data/demo-data", post(data::seed_demo_data))
        .route("/data/snapshot", post(data::create_snapshot))
        .route("/data/snapshots", get(data::list_snapshots))
        .route("/data/snapshot/{version}", get(data::get_snapshot))
        .route(
            "/data/snapshot/{version}/restore",
            post(data::restore_snapshot),
        )
        .route("/data/clear-data", delete(data::clear_data))
        .route("/data/credentials", get(data::credentials))
        .route("/data/setup-fresh", post(data::setup_fresh))
        .route("/data/create-admin", post(data::create_admin))
        .route("/data/reset-demo", post(data::reset_demo))
        .route("/data/make-admin/{username}", post(data::make_admin))
        .route("/vuln/catalog", get(vuln::catalog))
        .route("/vuln/sql/search", get(vuln::sql_search))
        .route("/vuln/sql/login", post(vuln::sql_login))
        .route("/vuln/nosql/login", post(vuln::nosql_login))
        .route("/vuln/xss/search", get(vuln::xss_search))
        .route(
            "/vuln/xss/comment",
            post(vuln::xss_comment),
        )
        .route("/vuln/xss/comments", get(vuln::xss_comments))
        .route("/vuln/xxe/parse", post(vuln::xxe_parse))
        .route("/vuln/deserialize", post(vuln::deserialize_payload))
        .route("/vuln/command/ping", post(vuln::command_ping))
        .route("/vuln/auth/hash", post(vuln::weak_hash))
        .route("/vuln/auth/token", post(vuln::weak_token));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        auth::refresh,
        users::get_me,
        users::update_me,
        users::search,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        wallets::create_wallet,
        wallets::list_wallets,
        wallets::total_balance,
        wallets::get_wallet,
        wallets::update_wallet,
        wallets::delete_wallet,
        wallets::transfer,
        wallets::deposit,
        wallets::withdraw,
        wallets::wallet_transactions,
        wallets::send_money,
        wallets::quick_deposit,
        wallets::quick_withdraw,
        transactions::list_transactions,
        transactions::get_transaction,
        support::create_ticket,
        support::list_tickets,
        admin::dashboard,
        admin::list_users,
        admin::list_wallets,
        admin::list_transactions,
        admin::audit_logs,
        admin::toggle_status,
        admin::toggle_admin,
        admin::stats,
        admin::reap_sessions,
        data::seed_demo_data,
        data::create_snapshot,
        data::list_snapshots,
        data::get_snapshot,
        data::restore_snapshot,
        data::clear_data,
        data::credentials,
        data::setup_fresh,
        data::create_admin,
        data::reset_demo,
        data::make_admin,
        health::health,
        health::liveness,
        health::readiness,
        vuln::catalog,
        vuln::sql_search,
        vuln::sql_login,
        vuln::nosql_login,
        vuln::xss_search,
        vuln::xss_comment,
        vuln::xss_comments,
        vuln::xxe_parse,
        vuln::deserialize_payload,
        vuln::command_ping,
        vuln::weak_hash,
        vuln::weak_token
    ),
    components(
        schemas(
            Wallet,
            Transaction,
            TransactionType,
            TransactionStatus,
            SupportTicket,
            TicketStatus,
            TicketPriority,
            TicketCategory,
            AuditEvent,
            AuditEventType,
            LedgerCounts,
            FinancialTotals,
            SnapshotInfo,
            SnapshotDocument,
            SeedReport,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::SessionResponse,
            auth::LogoutResponse,
            users::UserResponse,
            users::UpdateUserRequest,
            wallets::CreateWalletRequest,
            wallets::UpdateWalletRequest,
            wallets::TransferRequest,
            wallets::AmountRequest,
            wallets::SendMoneyRequest,
            wallets::BalanceResponse,
            support::CreateTicketRequest,
            admin::DashboardResponse,
            admin::AdminUserRow,
            admin::StatsResponse,
            admin::ReapResponse,
            data::MessageResponse,
            data::CreateAdminResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            crate::vuln::VulnLevel,
            crate::vuln::TierSummary,
            crate::vuln::VulnClass,
            crate::vuln::CatalogReport,
            crate::vuln::sql::SqlRow,
            crate::vuln::sql::SqlSearchReport,
            crate::vuln::sql::SqlLoginReport,
            crate::vuln::nosql::NoSqlRow,
            crate::vuln::nosql::NoSqlLoginReport,
            crate::vuln::xss::XssReport,
            crate::vuln::xxe::EntityKind,
            crate::vuln::xxe::ResolvedEntity,
            crate::vuln::xxe::XxeReport,
            crate::vuln::xxe::SafeParseReport,
            crate::vuln::deserialize::GadgetEffect,
            crate::vuln::deserialize::DeserializeReport,
            crate::vuln::deserialize::SafeLoadReport,
            crate::vuln::command::PingReport,
            crate::vuln::weak_auth::HashReport,
            crate::vuln::weak_auth::TokenReport,
            crate::vuln::weak_auth::PolicyReport,
            vuln::SqlLoginRequest,
            vuln::CommentRequest,
            vuln::XmlParseRequest,
            vuln::DeserializeRequest,
            vuln::PingRequest,
            vuln::HashRequest,
            vuln::TokenRequest,
            vuln::WeakHashResponse,
            vuln::XxeResponse,
            vuln::DeserializeResponse
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login, and sessions"),
        (name = "Users", description = "Profile management and user search"),
        (name = "Wallets", description = "Wallet CRUD and money movement"),
        (name = "Transactions", description = "Transaction history"),
        (name = "Support", description = "Support tickets"),
        (name = "Admin", description = "Administrative operations"),
        (name = "Data", description = "Demo data, snapshots, and bootstrap"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Vulnerabilities", description = "Deliberately vulnerable training endpoints")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::temp_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = temp_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn health_endpoint_responds_through_the_router() {
        let (state, _dir) = temp_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_token() {
        let (state, _dir) = temp_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/wallets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn openapi_document_serializes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/v1/wallets/{wallet_id}/transfer"));
        assert!(json.contains("/v1/vuln/sql/search"));
    }
}
