// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction history endpoints.
//!
//! A non-admin caller only sees transactions touching one of their own
//! wallets; an admin sees everything.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{Auth, AuthenticatedUser},
    error::ApiError,
    models::Transaction,
    state::AppState,
};

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LimitQuery {
    /// Maximum rows to return, newest first.
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/v1/transactions",
    params(LimitQuery),
    tag = "Transactions",
    security(("bearer" = [])),
    responses((status = 200, body = [Transaction]))
)]
pub async fn list_transactions(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let rows = if user.is_admin {
        state.store.list_all_transactions(limit)?
    } else {
        state.store.list_user_transactions(user.user_id, limit)?
    };
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/v1/transactions/{tx_id}",
    params(("tx_id" = u64, Path, description = "Transaction to fetch")),
    tag = "Transactions",
    security(("bearer" = [])),
    responses(
        (status = 200, body = Transaction),
        (status = 403, description = "Caller's wallets are not involved")
    )
)]
pub async fn get_transaction(
    Auth(user): Auth,
    Path(tx_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<Transaction>, ApiError> {
    let tx = state.store.get_transaction(tx_id)?;
    require_involvement(&state, &user, &tx)?;
    Ok(Json(tx))
}

/// A caller is involved in a transaction when one of their wallets is
/// its source or destination.
fn require_involvement(
    state: &AppState,
    caller: &AuthenticatedUser,
    tx: &Transaction,
) -> Result<(), ApiError> {
    if caller.is_admin {
        return Ok(());
    }
    let involved = [tx.from_wallet_id, tx.to_wallet_id]
        .into_iter()
        .flatten()
        .any(|wallet_id| {
            state
                .store
                .get_wallet(wallet_id)
                .map(|w| w.user_id == caller.user_id)
                .unwrap_or(false)
        });
    if involved {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Not allowed to access this transaction",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::temp_state;
    use rust_decimal_macros::dec;

    fn seeded(state: &AppState) -> (AuthenticatedUser, AuthenticatedUser, Transaction) {
        let alice = state
            .store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        let carol = state
            .store
            .insert_user("carol", "carol@example.com", "h", false)
            .unwrap();
        let w1 = state
            .store
            .create_wallet_with_balance(alice.id, "A", "USD", dec!(100.00))
            .unwrap();
        let tx = state.store.deposit(w1.id, dec!(10.00), "top up").unwrap();
        (
            AuthenticatedUser::from(&alice),
            AuthenticatedUser::from(&carol),
            tx,
        )
    }

    #[tokio::test]
    async fn owner_reads_their_transaction() {
        let (state, _dir) = temp_state();
        let (alice, _carol, tx) = seeded(&state);

        let Json(row) = get_transaction(Auth(alice), Path(tx.id), State(state))
            .await
            .unwrap();
        assert_eq!(row.id, tx.id);
    }

    #[tokio::test]
    async fn uninvolved_caller_is_rejected() {
        let (state, _dir) = temp_state();
        let (_alice, carol, tx) = seeded(&state);

        let err = get_transaction(Auth(carol), Path(tx.id), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listing_scopes_by_caller() {
        let (state, _dir) = temp_state();
        let (alice, carol, _tx) = seeded(&state);

        let Json(mine) = list_transactions(
            Auth(alice),
            State(state.clone()),
            Query(LimitQuery { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(mine.len(), 1);

        let Json(none) = list_transactions(
            Auth(carol),
            State(state),
            Query(LimitQuery { limit: None }),
        )
        .await
        .unwrap();
        assert!(none.is_empty());
    }
}
