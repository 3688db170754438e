// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Core Data Models
//!
//! Persistent entities for the wallet ledger. Rows are stored as JSON in
//! redb, so every type here derives `Serialize` and `Deserialize`; types
//! that also appear in API responses derive `ToSchema` for the OpenAPI
//! document.
//!
//! ## Model Categories
//!
//! - **Users**: Account identity and credentials
//! - **Wallets**: Balances, one row per wallet, soft-deleted via `is_active`
//! - **Transactions**: The append-only money movement ledger
//! - **Support Tickets**: Customer support records
//! - **Sessions**: Opaque bearer-token sessions
//!
//! Monetary amounts use [`rust_decimal::Decimal`] with two fractional
//! digits and serialize as decimal strings (`"10000.00"`), never floats.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Users
// =============================================================================

/// A registered account.
///
/// `password_hash` is stored alongside the row and must never be exposed
/// through the regular API; response DTOs copy the public fields only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Wallets
// =============================================================================

/// A wallet holding a single-currency balance.
///
/// Deletion is soft: `is_active` flips to `false` and the row stays so that
/// transaction history keeps resolving. Balances change only through the
/// ledger operations (transfer, deposit, withdraw) or a snapshot restore.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Wallet {
    pub id: u64,
    pub user_id: u64,
    pub wallet_name: String,
    /// Current balance, two fractional digits.
    #[schema(value_type = String, example = "1000.00")]
    pub balance: Decimal,
    /// ISO 4217 code, e.g. `USD`.
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Transactions
// =============================================================================

/// Kind of money movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle state of a transaction row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// One ledger entry. Immutable once written.
///
/// `from_wallet_id` is `None` for deposits (money enters from outside);
/// `to_wallet_id` is `None` for withdrawals (money leaves the system).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Transaction {
    pub id: u64,
    pub from_wallet_id: Option<u64>,
    pub to_wallet_id: Option<u64>,
    #[schema(value_type = String, example = "250.00")]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Support Tickets
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketCategory {
    Account,
    Transaction,
    Security,
    Technical,
    Billing,
    General,
}

/// A customer support ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SupportTicket {
    pub id: u64,
    pub user_id: u64,
    pub subject: String,
    pub message: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sessions
// =============================================================================

/// An opaque bearer-token session.
///
/// The token is a UUIDv4 handed out at login. Expired rows are inert (the
/// authenticator rejects them) until the admin-triggered reaper deletes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
