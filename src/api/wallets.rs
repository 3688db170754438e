// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet management and ledger operation endpoints.
//!
//! All operations require authentication and enforce ownership: a
//! non-admin caller may only act on their own wallets.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::{Auth, AuthenticatedUser},
    error::ApiError,
    models::{Transaction, Wallet},
    state::AppState,
    storage::{AuditEventType, WalletUpdate},
};

const DEFAULT_TX_LIMIT: usize = 50;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWalletRequest {
    pub wallet_name: String,
    /// ISO 4217 code; defaults to USD.
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWalletRequest {
    pub wallet_name: Option<String>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

/// Transfer out of a specific wallet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    pub to_wallet_id: u64,
    #[schema(value_type = String, example = "250.00")]
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AmountRequest {
    #[schema(value_type = String, example = "100.00")]
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Convenience transfer: the recipient is named by email or user id and
/// resolved to their first active wallet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMoneyRequest {
    /// Recipient email address.
    pub recipient_email: Option<String>,
    /// Recipient user id, used when no email is given.
    pub recipient_id: Option<u64>,
    #[schema(value_type = String, example = "250.00")]
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Sum of the caller's active wallet balances.
    #[schema(value_type = String, example = "5000.00")]
    pub total_balance: Decimal,
    pub wallet_count: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TxLimitQuery {
    /// Maximum rows to return, newest first.
    pub limit: Option<usize>,
}

#[utoipa::path(
    post,
    path = "/v1/wallets",
    request_body = CreateWalletRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 201, body = Wallet))
)]
pub async fn create_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<Wallet>), ApiError> {
    let name = request.wallet_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Wallet name cannot be empty"));
    }
    let currency = normalize_currency(request.currency.as_deref())?;

    let wallet = state.store.create_wallet(user.user_id, name, &currency)?;
    audit_log!(
        state,
        AuditEventType::WalletCreated,
        user,
        "wallet",
        wallet.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(wallet)))
}

#[utoipa::path(
    get,
    path = "/v1/wallets",
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 200, body = [Wallet]))
)]
pub async fn list_wallets(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Wallet>>, ApiError> {
    Ok(Json(state.store.list_wallets(user.user_id)?))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/balance",
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 200, body = BalanceResponse))
)]
pub async fn total_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let wallets = state.store.list_wallets(user.user_id)?;
    Ok(Json(BalanceResponse {
        total_balance: wallets.iter().map(|w| w.balance).sum(),
        wallet_count: wallets.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}",
    params(("wallet_id" = u64, Path, description = "Wallet to fetch")),
    tag = "Wallets",
    security(("bearer" = [])),
    responses(
        (status = 200, body = Wallet),
        (status = 403, description = "Not the owner and not an admin")
    )
)]
pub async fn get_wallet(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<Wallet>, ApiError> {
    let wallet = owned_wallet(&state, &user, wallet_id)?;
    Ok(Json(wallet))
}

#[utoipa::path(
    put,
    path = "/v1/wallets/{wallet_id}",
    params(("wallet_id" = u64, Path, description = "Wallet to update")),
    request_body = UpdateWalletRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 200, body = Wallet))
)]
pub async fn update_wallet(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<UpdateWalletRequest>,
) -> Result<Json<Wallet>, ApiError> {
    owned_wallet(&state, &user, wallet_id)?;

    let currency = match request.currency.as_deref() {
        Some(code) => Some(normalize_currency(Some(code))?),
        None => None,
    };
    let wallet = state.store.update_wallet(
        wallet_id,
        WalletUpdate {
            wallet_name: request.wallet_name,
            currency,
            is_active: request.is_active,
        },
    )?;
    audit_log!(
        state,
        AuditEventType::WalletUpdated,
        user,
        "wallet",
        wallet_id.to_string()
    );
    Ok(Json(wallet))
}

/// Soft delete; the wallet row stays so transaction history resolves.
#[utoipa::path(
    delete,
    path = "/v1/wallets/{wallet_id}",
    params(("wallet_id" = u64, Path, description = "Wallet to deactivate")),
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 200, body = Wallet))
)]
pub async fn delete_wallet(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<Wallet>, ApiError> {
    owned_wallet(&state, &user, wallet_id)?;
    let wallet = state.store.delete_wallet(wallet_id)?;
    audit_log!(
        state,
        AuditEventType::WalletDeleted,
        user,
        "wallet",
        wallet_id.to_string()
    );
    Ok(Json(wallet))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{wallet_id}/transfer",
    params(("wallet_id" = u64, Path, description = "Source wallet")),
    request_body = TransferRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Transaction),
        (status = 400, description = "Invalid amount or insufficient funds")
    )
)]
pub async fn transfer(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    owned_wallet(&state, &user, wallet_id)?;
    let tx = state.store.transfer(
        wallet_id,
        request.to_wallet_id,
        request.amount,
        request.description.as_deref().unwrap_or("Transfer"),
    )?;
    audit_log!(
        state,
        AuditEventType::FundsTransferred,
        user,
        "transaction",
        tx.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(tx)))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{wallet_id}/deposit",
    params(("wallet_id" = u64, Path, description = "Destination wallet")),
    request_body = AmountRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 201, body = Transaction))
)]
pub async fn deposit(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    owned_wallet(&state, &user, wallet_id)?;
    let tx = state.store.deposit(
        wallet_id,
        request.amount,
        request.description.as_deref().unwrap_or("Deposit"),
    )?;
    audit_log!(
        state,
        AuditEventType::FundsDeposited,
        user,
        "transaction",
        tx.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(tx)))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{wallet_id}/withdraw",
    params(("wallet_id" = u64, Path, description = "Source wallet")),
    request_body = AmountRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Transaction),
        (status = 400, description = "Invalid amount or insufficient funds")
    )
)]
pub async fn withdraw(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    owned_wallet(&state, &user, wallet_id)?;
    let tx = state.store.withdraw(
        wallet_id,
        request.amount,
        request.description.as_deref().unwrap_or("Withdrawal"),
    )?;
    audit_log!(
        state,
        AuditEventType::FundsWithdrawn,
        user,
        "transaction",
        tx.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(tx)))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/transactions",
    params(
        ("wallet_id" = u64, Path, description = "Wallet whose ledger to read"),
        TxLimitQuery
    ),
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 200, body = [Transaction]))
)]
pub async fn wallet_transactions(
    Auth(user): Auth,
    Path(wallet_id): Path<u64>,
    State(state): State<AppState>,
    Query(query): Query<TxLimitQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    owned_wallet(&state, &user, wallet_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_TX_LIMIT);
    Ok(Json(state.store.list_wallet_transactions(wallet_id, limit)?))
}

/// Send money to another user without knowing their wallet ids.
#[utoipa::path(
    post,
    path = "/v1/wallets/transfer",
    request_body = SendMoneyRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Transaction),
        (status = 404, description = "Recipient or active wallet missing")
    )
)]
pub async fn send_money(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SendMoneyRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let source = first_active_wallet(&state, user.user_id)?;

    let recipient_id = match (&request.recipient_email, request.recipient_id) {
        (Some(email), _) => state
            .store
            .get_user_by_email(email)?
            .ok_or_else(|| ApiError::not_found("Recipient not found"))?
            .id,
        (None, Some(id)) => id,
        (None, None) => {
            return Err(ApiError::bad_request(
                "Either recipient_email or recipient_id is required",
            ))
        }
    };
    let dest = first_active_wallet(&state, recipient_id)?;

    let tx = state.store.transfer(
        source.id,
        dest.id,
        request.amount,
        request.description.as_deref().unwrap_or("Transfer"),
    )?;
    audit_log!(
        state,
        AuditEventType::FundsTransferred,
        user,
        "transaction",
        tx.id.to_string()
    );
    Ok((StatusCode::CREATED, Json(tx)))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/deposit",
    request_body = AmountRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 201, body = Transaction))
)]
pub async fn quick_deposit(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let wallet = first_active_wallet(&state, user.user_id)?;
    deposit(Auth(user), Path(wallet.id), State(state), Json(request)).await
}

#[utoipa::path(
    post,
    path = "/v1/wallets/withdraw",
    request_body = AmountRequest,
    tag = "Wallets",
    security(("bearer" = [])),
    responses((status = 201, body = Transaction))
)]
pub async fn quick_withdraw(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let wallet = first_active_wallet(&state, user.user_id)?;
    withdraw(Auth(user), Path(wallet.id), State(state), Json(request)).await
}

/// Fetch a wallet and enforce the ownership rule.
fn owned_wallet(
    state: &AppState,
    caller: &AuthenticatedUser,
    wallet_id: u64,
) -> Result<Wallet, ApiError> {
    let wallet = state.store.get_wallet(wallet_id)?;
    if wallet.user_id != caller.user_id && !caller.is_admin {
        return Err(ApiError::forbidden("Not allowed to access this wallet"));
    }
    Ok(wallet)
}

fn first_active_wallet(state: &AppState, user_id: u64) -> Result<Wallet, ApiError> {
    state
        .store
        .first_active_wallet(user_id)?
        .ok_or_else(|| ApiError::not_found("No active wallet for user"))
}

fn normalize_currency(code: Option<&str>) -> Result<String, ApiError> {
    let code = code.unwrap_or("USD").trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::bad_request("Currency must be a 3-letter code"));
    }
    Ok(code)
}
