// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The vulnerability exercise surface.
//!
//! No authentication: the exercises are the product. Every endpoint is
//! gated by the configured maximum level; asking for a tier above it
//! behaves as if the route did not exist. Each invocation is audited so
//! instructors can replay a session.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
    vuln::{
        self, command, deserialize, nosql, sql, weak_auth, xss, xxe, CatalogReport, VulnLevel,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    pub q: String,
    /// Exercise tier; defaults to basic.
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SqlLoginRequest {
    pub username: String,
    pub password: String,
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LevelParam {
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub username: String,
    pub comment: String,
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct XmlParseRequest {
    pub xml: String,
    pub level: Option<VulnLevel>,
    /// Run the hardened parser instead.
    #[serde(default)]
    pub safe: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeserializeRequest {
    /// The serialized document, as a JSON string.
    pub payload: String,
    pub level: Option<VulnLevel>,
    #[serde(default)]
    pub safe: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PingRequest {
    pub host: String,
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HashRequest {
    pub password: String,
    pub level: Option<VulnLevel>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub user_id: u64,
    pub username: String,
    pub level: Option<VulnLevel>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct WeakHashResponse {
    pub hash: weak_auth::HashReport,
    pub policy: weak_auth::PolicyReport,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct XxeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerable: Option<xxe::XxeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe: Option<xxe::SafeParseReport>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct DeserializeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerable: Option<deserialize::DeserializeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe: Option<deserialize::SafeLoadReport>,
}

/// Reject tiers above the configured maximum as if the route were absent.
fn require_level(state: &AppState, requested: Option<VulnLevel>) -> Result<VulnLevel, ApiError> {
    let level = requested.unwrap_or(VulnLevel::Basic);
    if state.config.vuln_level.allows(level) {
        Ok(level)
    } else {
        Err(ApiError::not_found("Vulnerability not available"))
    }
}

fn audit_invocation(state: &AppState, module: &str, level: VulnLevel) {
    audit_log!(
        state,
        AuditEvent::new(AuditEventType::VulnerabilityInvoked)
            .with_details(serde_json::json!({ "module": module, "level": level }))
    );
}

#[utoipa::path(
    get,
    path = "/v1/vuln/sql/search",
    params(SearchParams),
    tag = "Vulnerabilities",
    responses(
        (status = 200, body = sql::SqlSearchReport),
        (status = 404, description = "Tier not enabled")
    )
)]
pub async fn sql_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<sql::SqlSearchReport>, ApiError> {
    let level = require_level(&state, params.level)?;
    let users = state.store.list_users()?;
    let wallets = state.store.list_all_wallets()?;
    audit_invocation(&state, "sql-injection", level);
    Ok(Json(sql::search_users(level, &params.q, &users, &wallets)))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/sql/login",
    request_body = SqlLoginRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = sql::SqlLoginReport))
)]
pub async fn sql_login(
    State(state): State<AppState>,
    Json(request): Json<SqlLoginRequest>,
) -> Result<Json<sql::SqlLoginReport>, ApiError> {
    let level = require_level(&state, request.level)?;
    let users = state.store.list_users()?;
    audit_invocation(&state, "sql-injection", level);
    Ok(Json(sql::login(
        level,
        &request.username,
        &request.password,
        &users,
    )))
}

/// The body minus the `level` key is the filter document; from the
/// medium tier up it is evaluated as-is.
#[utoipa::path(
    post,
    path = "/v1/vuln/nosql/login",
    params(LevelParam),
    tag = "Vulnerabilities",
    responses((status = 200, body = nosql::NoSqlLoginReport))
)]
pub async fn nosql_login(
    State(state): State<AppState>,
    Query(params): Query<LevelParam>,
    Json(body): Json<Value>,
) -> Result<Json<nosql::NoSqlLoginReport>, ApiError> {
    let level = require_level(&state, params.level)?;
    let users = state.store.list_users()?;
    audit_invocation(&state, "nosql-injection", level);
    Ok(Json(nosql::login(level, &body, &users)))
}

#[utoipa::path(
    get,
    path = "/v1/vuln/xss/search",
    params(SearchParams),
    tag = "Vulnerabilities",
    responses((status = 200, body = xss::XssReport))
)]
pub async fn xss_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<xss::XssReport>, ApiError> {
    let level = require_level(&state, params.level)?;
    audit_invocation(&state, "xss", level);
    Ok(Json(xss::reflected_search(level, &params.q)))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/xss/comment",
    request_body = CommentRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = xss::XssReport))
)]
pub async fn xss_comment(
    State(state): State<AppState>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<xss::XssReport>, ApiError> {
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "xss", level);

    let stored = {
        let mut board = lock_board(&state);
        board.post(&request.username, &request.comment, level)
    };
    Ok(Json(xss::render_comment(&stored)))
}

/// Render every stored comment at the tier it was posted with.
#[utoipa::path(
    get,
    path = "/v1/vuln/xss/comments",
    tag = "Vulnerabilities",
    responses((status = 200, body = [xss::XssReport]))
)]
pub async fn xss_comments(
    State(state): State<AppState>,
) -> Result<Json<Vec<xss::XssReport>>, ApiError> {
    let board = lock_board(&state);
    Ok(Json(board.comments().iter().map(xss::render_comment).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/xxe/parse",
    request_body = XmlParseRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = XxeResponse))
)]
pub async fn xxe_parse(
    State(state): State<AppState>,
    Json(request): Json<XmlParseRequest>,
) -> Result<Json<XxeResponse>, ApiError> {
    if request.safe {
        return Ok(Json(XxeResponse {
            vulnerable: None,
            safe: Some(xxe::parse_safe(&request.xml)),
        }));
    }
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "xxe", level);
    Ok(Json(XxeResponse {
        vulnerable: Some(xxe::parse(level, &request.xml)),
        safe: None,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/deserialize",
    request_body = DeserializeRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = DeserializeResponse))
)]
pub async fn deserialize_payload(
    State(state): State<AppState>,
    Json(request): Json<DeserializeRequest>,
) -> Result<Json<DeserializeResponse>, ApiError> {
    if request.safe {
        return Ok(Json(DeserializeResponse {
            vulnerable: None,
            safe: Some(deserialize::load_safe(&request.payload)),
        }));
    }
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "insecure-deserialization", level);
    Ok(Json(DeserializeResponse {
        vulnerable: Some(deserialize::load(level, &request.payload)),
        safe: None,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/command/ping",
    request_body = PingRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = command::PingReport))
)]
pub async fn command_ping(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> Result<Json<command::PingReport>, ApiError> {
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "command-injection", level);
    Ok(Json(command::ping(level, &request.host)))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/auth/hash",
    request_body = HashRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = WeakHashResponse))
)]
pub async fn weak_hash(
    State(state): State<AppState>,
    Json(request): Json<HashRequest>,
) -> Result<Json<WeakHashResponse>, ApiError> {
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "weak-authentication", level);
    Ok(Json(WeakHashResponse {
        hash: weak_auth::hash_report(level, &request.password),
        policy: weak_auth::password_policy(level, &request.password),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/vuln/auth/token",
    request_body = TokenRequest,
    tag = "Vulnerabilities",
    responses((status = 200, body = weak_auth::TokenReport))
)]
pub async fn weak_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<weak_auth::TokenReport>, ApiError> {
    let level = require_level(&state, request.level)?;
    audit_invocation(&state, "weak-authentication", level);
    let report = weak_auth::token_report(level, request.user_id, &request.username)
        .map_err(|e| {
            tracing::error!(error = %e, "Weak token minting failed");
            ApiError::internal("Token minting failed")
        })?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/v1/vuln/catalog",
    tag = "Vulnerabilities",
    responses((status = 200, body = CatalogReport))
)]
pub async fn catalog(State(state): State<AppState>) -> Json<CatalogReport> {
    Json(vuln::catalog(state.config.vuln_level))
}

fn lock_board(state: &AppState) -> std::sync::MutexGuard<'_, xss::CommentBoard> {
    // A poisoned lock only means a panic mid-post; the board data is
    // still usable for the exercise.
    state
        .xss_comments
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::tests::temp_state;
    use std::sync::Arc;

    fn with_level(level: VulnLevel) -> (AppState, tempfile::TempDir) {
        let (mut state, dir) = temp_state();
        let mut config = Config::clone(&state.config);
        config.vuln_level = level;
        state.config = Arc::new(config);
        (state, dir)
    }

    #[tokio::test]
    async fn tier_above_configured_level_is_hidden() {
        let (state, _dir) = with_level(VulnLevel::Basic);
        let err = sql_search(
            State(state),
            Query(SearchParams {
                q: "alice".to_string(),
                level: Some(VulnLevel::Expert),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Vulnerability not available");
    }

    #[tokio::test]
    async fn classic_tautology_bypasses_basic_search() {
        let (state, _dir) = with_level(VulnLevel::Expert);
        state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        state
            .store
            .insert_user("bob", "bob@example.com", "h", false)
            .unwrap();

        let Json(report) = sql_search(
            State(state),
            Query(SearchParams {
                q: "' OR '1'='1".to_string(),
                level: Some(VulnLevel::Basic),
            }),
        )
        .await
        .unwrap();
        assert!(report.injection_detected);
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn stored_comment_renders_at_its_posting_tier() {
        let (state, _dir) = with_level(VulnLevel::Expert);
        xss_comment(
            State(state.clone()),
            Json(CommentRequest {
                username: "mallory".to_string(),
                comment: "<script>steal()</script>".to_string(),
                level: Some(VulnLevel::Basic),
            }),
        )
        .await
        .unwrap();

        let Json(rendered) = xss_comments(State(state)).await.unwrap();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].html.contains("<script>steal()</script>"));
        assert!(rendered[0].injection_detected);
    }

    #[tokio::test]
    async fn invocations_are_audited() {
        let (state, _dir) = with_level(VulnLevel::Expert);
        command_ping(
            State(state.clone()),
            Json(PingRequest {
                host: "localhost".to_string(),
                level: Some(VulnLevel::Basic),
            }),
        )
        .await
        .unwrap();

        let events = state.store.list_audit_events(10).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == AuditEventType::VulnerabilityInvoked));
    }

    #[tokio::test]
    async fn catalog_reflects_configured_level() {
        let (state, _dir) = with_level(VulnLevel::Medium);
        let Json(report) = catalog(State(state)).await;
        assert_eq!(report.vulnerability_level, VulnLevel::Medium);
        let sql_class = report
            .classes
            .iter()
            .find(|c| c.name == "sql-injection")
            .unwrap();
        assert!(sql_class.tiers[1].enabled);
        assert!(!sql_class.tiers[2].enabled);
    }
}
