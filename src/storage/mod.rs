// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage Module
//!
//! This module provides persistent storage using **redb**, an embedded
//! ACID key-value store. All ledger state lives in a single database file
//! under the configured data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! <DATA_DIR>/
//!   vulnwallet.redb      # users, wallets, transactions, tickets,
//!                        # sessions, audit rows, id counters
//!   snapshots/
//!     snapshot_{version}.json
//!   audit/
//!     audit-{date}.jsonl # Daily audit log mirror
//! ```
//!
//! ## Consistency Model
//!
//! redb serializes writers: every mutating wallet operation runs inside a
//! single write transaction, so a transfer debits and credits atomically
//! and two racing debits of one wallet cannot both observe the same
//! balance. Reads run on MVCC read transactions and never see a
//! half-committed operation.

pub mod audit;
pub mod store;

pub use audit::{AuditEvent, AuditEventType, AuditFileLog};
pub use store::{FinancialTotals, LedgerCounts, LedgerRows, UserUpdate, WalletStore, WalletUpdate};

/// Low-level storage failures. Wrapped into
/// [`ServiceError::Persistence`](crate::error::ServiceError) before they
/// reach any caller outside the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
