// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! redb-backed ledger store.
//!
//! One database file holds every table. Rows are JSON-encoded with serde;
//! numeric surrogate ids come from a counters table and are assigned
//! monotonically, so a reverse id scan is newest-first.
//!
//! ## Per-wallet transaction index
//!
//! `wallet_tx_index` maps a composite byte key to a transaction id:
//!
//! ```text
//! wallet_id (8 bytes BE) | '|' | !created_at_micros (8 bytes BE) | '|' | !tx_id (8 bytes BE)
//! ```
//!
//! Inverting the timestamp (and the id as tiebreaker) makes an ascending
//! range scan yield newest-first without sorting. A prefix range bounded
//! by `wallet_id|` and `wallet_id|` + `0xFF` padding isolates one wallet.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::models::{
    Session, SupportTicket, TicketCategory, TicketPriority, TicketStatus, Transaction,
    TransactionStatus, TransactionType, User, Wallet,
};

use super::AuditEvent;

// =============================================================================
// Tables
// =============================================================================

/// User rows: id -> JSON-encoded User.
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Unique username index: username -> user id.
const USERS_BY_NAME: TableDefinition<&str, u64> = TableDefinition::new("users_by_username");

/// Unique email index: email -> user id.
const USERS_BY_EMAIL: TableDefinition<&str, u64> = TableDefinition::new("users_by_email");

/// Wallet rows: id -> JSON-encoded Wallet.
const WALLETS: TableDefinition<u64, &[u8]> = TableDefinition::new("wallets");

/// Transaction rows: id -> JSON-encoded Transaction.
const TRANSACTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("transactions");

/// Per-wallet transaction index: composite key -> transaction id.
const WALLET_TX_INDEX: TableDefinition<&[u8], u64> = TableDefinition::new("wallet_tx_index");

/// Support ticket rows: id -> JSON-encoded SupportTicket.
const TICKETS: TableDefinition<u64, &[u8]> = TableDefinition::new("support_tickets");

/// Session rows: bearer token -> JSON-encoded Session.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Audit rows: id -> JSON-encoded AuditEvent.
const AUDIT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");

/// Identity counters: table name -> last assigned id.
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const USER_COUNTER: &str = "users";
const WALLET_COUNTER: &str = "wallets";
const TX_COUNTER: &str = "transactions";
const TICKET_COUNTER: &str = "support_tickets";
const AUDIT_COUNTER: &str = "audit_log";

// =============================================================================
// Row collections and partial updates
// =============================================================================

/// Every ledger row, as exported for a snapshot or supplied by a restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerRows {
    pub users: Vec<User>,
    pub wallets: Vec<Wallet>,
    pub transactions: Vec<Transaction>,
    pub support_tickets: Vec<SupportTicket>,
}

/// Partial user update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

/// Partial wallet update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub wallet_name: Option<String>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

/// Row counts across the ledger, for the admin dashboard.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct LedgerCounts {
    pub users: u64,
    pub active_users: u64,
    pub wallets: u64,
    pub active_wallets: u64,
    pub transactions: u64,
    pub support_tickets: u64,
    pub open_tickets: u64,
    pub sessions: u64,
}

/// Aggregated money figures, for the admin stats endpoint.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct FinancialTotals {
    /// Sum of all active wallet balances.
    #[schema(value_type = String, example = "23500.00")]
    pub total_balance: Decimal,
    /// Sum of all completed transaction amounts.
    #[schema(value_type = String, example = "4750.00")]
    pub total_volume: Decimal,
}

// =============================================================================
// Store
// =============================================================================

/// The wallet ledger, backed by a single redb database.
///
/// All mutating operations run inside one write transaction and either
/// commit fully or leave the ledger untouched. redb serializes writers,
/// so two racing debits of the same wallet cannot both observe the same
/// balance.
pub struct WalletStore {
    db: Database,
}

impl WalletStore {
    /// Open (or create) the database and make sure every table exists.
    pub fn open(path: &Path) -> Result<Self, super::StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create tables so read transactions never race table creation.
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(USERS)?;
            write_txn.open_table(USERS_BY_NAME)?;
            write_txn.open_table(USERS_BY_EMAIL)?;
            write_txn.open_table(WALLETS)?;
            write_txn.open_table(TRANSACTIONS)?;
            write_txn.open_table(WALLET_TX_INDEX)?;
            write_txn.open_table(TICKETS)?;
            write_txn.open_table(SESSIONS)?;
            write_txn.open_table(AUDIT_LOG)?;
            write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap liveness probe used by the readiness endpoint.
    pub fn ping(&self) -> Result<(), super::StoreError> {
        self.db.begin_read()?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user, enforcing unique username and email.
    pub fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, ServiceError> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut by_name = write_txn.open_table(USERS_BY_NAME)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;

            if by_name.get(username)?.is_some() {
                return Err(ServiceError::validation("Username already registered"));
            }
            if by_email.get(email)?.is_some() {
                return Err(ServiceError::validation("Email already registered"));
            }

            let id = next_id(&write_txn, USER_COUNTER)?;
            let user = User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                is_admin,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
            by_name.insert(username, id)?;
            by_email.insert(email, id)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn get_user(&self, user_id: u64) -> Result<User, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let guard = users
            .get(user_id)?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let by_name = read_txn.open_table(USERS_BY_NAME)?;
        let id = match by_name.get(username)? {
            Some(guard) => guard.value(),
            None => return Ok(None),
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let by_email = read_txn.open_table(USERS_BY_EMAIL)?;
        let id = match by_email.get(email)? {
            Some(guard) => guard.value(),
            None => return Ok(None),
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All users in id order.
    pub fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut result = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    /// Case-insensitive substring search over active users.
    pub fn search_users(&self, query: &str, limit: usize) -> Result<Vec<User>, ServiceError> {
        let needle = query.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut result = Vec::new();
        for entry in users.iter()? {
            if result.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let user: User = serde_json::from_slice(value.value())?;
            if user.is_active
                && (user.username.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle))
            {
                result.push(user);
            }
        }
        Ok(result)
    }

    /// Apply a partial update, keeping the unique indexes in step.
    pub fn update_user(&self, user_id: u64, update: UserUpdate) -> Result<User, ServiceError> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut by_name = write_txn.open_table(USERS_BY_NAME)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;

            let mut user: User = {
                let guard = users
                    .get(user_id)?
                    .ok_or_else(|| ServiceError::not_found("User"))?;
                serde_json::from_slice(guard.value())?
            };

            if let Some(username) = update.username {
                if username != user.username {
                    if by_name.get(username.as_str())?.is_some() {
                        return Err(ServiceError::validation("Username already registered"));
                    }
                    by_name.remove(user.username.as_str())?;
                    by_name.insert(username.as_str(), user_id)?;
                    user.username = username;
                }
            }
            if let Some(email) = update.email {
                if email != user.email {
                    if by_email.get(email.as_str())?.is_some() {
                        return Err(ServiceError::validation("Email already registered"));
                    }
                    by_email.remove(user.email.as_str())?;
                    by_email.insert(email.as_str(), user_id)?;
                    user.email = email;
                }
            }
            if let Some(password_hash) = update.password_hash {
                user.password_hash = password_hash;
            }
            if let Some(is_admin) = update.is_admin {
                user.is_admin = is_admin;
            }
            if let Some(is_active) = update.is_active {
                user.is_active = is_active;
            }
            user.updated_at = now;
            users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn set_user_active(&self, user_id: u64, is_active: bool) -> Result<User, ServiceError> {
        self.update_user(
            user_id,
            UserUpdate {
                is_active: Some(is_active),
                ..UserUpdate::default()
            },
        )
    }

    pub fn set_user_admin(&self, user_id: u64, is_admin: bool) -> Result<User, ServiceError> {
        self.update_user(
            user_id,
            UserUpdate {
                is_admin: Some(is_admin),
                ..UserUpdate::default()
            },
        )
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Create a wallet with a zero balance.
    pub fn create_wallet(
        &self,
        user_id: u64,
        wallet_name: &str,
        currency: &str,
    ) -> Result<Wallet, ServiceError> {
        self.create_wallet_with_balance(user_id, wallet_name, currency, Decimal::ZERO)
    }

    /// Create a wallet with an opening balance. Used by demo seeding; the
    /// opening balance is a creation attribute, not a ledger movement, so
    /// no transaction row is written.
    pub fn create_wallet_with_balance(
        &self,
        user_id: u64,
        wallet_name: &str,
        currency: &str,
        opening_balance: Decimal,
    ) -> Result<Wallet, ServiceError> {
        if opening_balance < Decimal::ZERO {
            return Err(ServiceError::validation("Opening balance cannot be negative"));
        }
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let wallet = {
            let users = write_txn.open_table(USERS)?;
            let owner: User = {
                let guard = users
                    .get(user_id)?
                    .ok_or_else(|| ServiceError::not_found("User"))?;
                serde_json::from_slice(guard.value())?
            };
            if !owner.is_active {
                return Err(ServiceError::validation("User account is deactivated"));
            }

            let mut wallets = write_txn.open_table(WALLETS)?;
            let id = next_id(&write_txn, WALLET_COUNTER)?;
            let wallet = Wallet {
                id,
                user_id,
                wallet_name: wallet_name.to_string(),
                balance: opening_balance,
                currency: currency.to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            wallets.insert(id, serde_json::to_vec(&wallet)?.as_slice())?;
            wallet
        };
        write_txn.commit()?;
        Ok(wallet)
    }

    /// Fetch a wallet row whether active or not; soft-deleted wallets stay
    /// resolvable for history and reactivation.
    pub fn get_wallet(&self, wallet_id: u64) -> Result<Wallet, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let wallets = read_txn.open_table(WALLETS)?;
        let guard = wallets
            .get(wallet_id)?
            .ok_or_else(|| ServiceError::not_found("Wallet"))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    /// Active wallets owned by the user, in creation order.
    pub fn list_wallets(&self, user_id: u64) -> Result<Vec<Wallet>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let wallets = read_txn.open_table(WALLETS)?;
        let mut result = Vec::new();
        for entry in wallets.iter()? {
            let (_, value) = entry?;
            let wallet: Wallet = serde_json::from_slice(value.value())?;
            if wallet.user_id == user_id && wallet.is_active {
                result.push(wallet);
            }
        }
        Ok(result)
    }

    /// Every wallet row, active or not. Admin surface only.
    pub fn list_all_wallets(&self) -> Result<Vec<Wallet>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let wallets = read_txn.open_table(WALLETS)?;
        let mut result = Vec::new();
        for entry in wallets.iter()? {
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    /// The user's oldest active wallet, if any. Used by the simplified
    /// transfer endpoints that don't name a wallet explicitly.
    pub fn first_active_wallet(&self, user_id: u64) -> Result<Option<Wallet>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let wallets = read_txn.open_table(WALLETS)?;
        for entry in wallets.iter()? {
            let (_, value) = entry?;
            let wallet: Wallet = serde_json::from_slice(value.value())?;
            if wallet.user_id == user_id && wallet.is_active {
                return Ok(Some(wallet));
            }
        }
        Ok(None)
    }

    pub fn update_wallet(
        &self,
        wallet_id: u64,
        update: WalletUpdate,
    ) -> Result<Wallet, ServiceError> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let wallet = {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut wallet: Wallet = {
                let guard = wallets
                    .get(wallet_id)?
                    .ok_or_else(|| ServiceError::not_found("Wallet"))?;
                serde_json::from_slice(guard.value())?
            };
            if let Some(wallet_name) = update.wallet_name {
                wallet.wallet_name = wallet_name;
            }
            if let Some(currency) = update.currency {
                wallet.currency = currency;
            }
            if let Some(is_active) = update.is_active {
                wallet.is_active = is_active;
            }
            wallet.updated_at = now;
            wallets.insert(wallet_id, serde_json::to_vec(&wallet)?.as_slice())?;
            wallet
        };
        write_txn.commit()?;
        Ok(wallet)
    }

    /// Soft-delete: flips `is_active` off and keeps the row. Idempotent.
    pub fn delete_wallet(&self, wallet_id: u64) -> Result<Wallet, ServiceError> {
        self.update_wallet(
            wallet_id,
            WalletUpdate {
                is_active: Some(false),
                ..WalletUpdate::default()
            },
        )
    }

    // =========================================================================
    // Money movement
    // =========================================================================

    /// Move funds between two active wallets. Debit, credit, and the
    /// transaction row commit together or not at all.
    pub fn transfer(
        &self,
        from_wallet_id: u64,
        to_wallet_id: u64,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, ServiceError> {
        validate_amount(amount)?;
        if from_wallet_id == to_wallet_id {
            return Err(ServiceError::validation(
                "Source and destination wallets must differ",
            ));
        }

        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let tx = {
            let mut wallets = write_txn.open_table(WALLETS)?;

            let mut source: Wallet = {
                let guard = wallets
                    .get(from_wallet_id)?
                    .ok_or_else(|| ServiceError::not_found("Source wallet"))?;
                serde_json::from_slice(guard.value())?
            };
            if !source.is_active {
                return Err(ServiceError::not_found("Source wallet"));
            }

            let mut dest: Wallet = {
                let guard = wallets
                    .get(to_wallet_id)?
                    .ok_or_else(|| ServiceError::not_found("Destination wallet"))?;
                serde_json::from_slice(guard.value())?
            };
            if !dest.is_active {
                return Err(ServiceError::not_found("Destination wallet"));
            }

            if source.balance < amount {
                return Err(ServiceError::InsufficientFunds {
                    balance: source.balance,
                    requested: amount,
                });
            }

            source.balance -= amount;
            source.updated_at = now;
            dest.balance += amount;
            dest.updated_at = now;
            wallets.insert(from_wallet_id, serde_json::to_vec(&source)?.as_slice())?;
            wallets.insert(to_wallet_id, serde_json::to_vec(&dest)?.as_slice())?;

            let tx_id = next_id(&write_txn, TX_COUNTER)?;
            let tx = Transaction {
                id: tx_id,
                from_wallet_id: Some(from_wallet_id),
                to_wallet_id: Some(to_wallet_id),
                amount,
                transaction_type: TransactionType::Transfer,
                status: TransactionStatus::Completed,
                description: description.to_string(),
                created_at: now,
            };
            let mut txs = write_txn.open_table(TRANSACTIONS)?;
            txs.insert(tx_id, serde_json::to_vec(&tx)?.as_slice())?;

            let mut index = write_txn.open_table(WALLET_TX_INDEX)?;
            index.insert(tx_index_key(from_wallet_id, now, tx_id).as_slice(), tx_id)?;
            index.insert(tx_index_key(to_wallet_id, now, tx_id).as_slice(), tx_id)?;
            tx
        };
        write_txn.commit()?;
        Ok(tx)
    }

    /// Credit an active wallet from outside the system.
    pub fn deposit(
        &self,
        wallet_id: u64,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, ServiceError> {
        validate_amount(amount)?;
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let tx = {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut wallet: Wallet = {
                let guard = wallets
                    .get(wallet_id)?
                    .ok_or_else(|| ServiceError::not_found("Wallet"))?;
                serde_json::from_slice(guard.value())?
            };
            if !wallet.is_active {
                return Err(ServiceError::not_found("Wallet"));
            }

            wallet.balance += amount;
            wallet.updated_at = now;
            wallets.insert(wallet_id, serde_json::to_vec(&wallet)?.as_slice())?;

            let tx_id = next_id(&write_txn, TX_COUNTER)?;
            let tx = Transaction {
                id: tx_id,
                from_wallet_id: None,
                to_wallet_id: Some(wallet_id),
                amount,
                transaction_type: TransactionType::Deposit,
                status: TransactionStatus::Completed,
                description: description.to_string(),
                created_at: now,
            };
            let mut txs = write_txn.open_table(TRANSACTIONS)?;
            txs.insert(tx_id, serde_json::to_vec(&tx)?.as_slice())?;

            let mut index = write_txn.open_table(WALLET_TX_INDEX)?;
            index.insert(tx_index_key(wallet_id, now, tx_id).as_slice(), tx_id)?;
            tx
        };
        write_txn.commit()?;
        Ok(tx)
    }

    /// Debit an active wallet; the money leaves the system, so the
    /// transaction row has no destination.
    pub fn withdraw(
        &self,
        wallet_id: u64,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, ServiceError> {
        validate_amount(amount)?;
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let tx = {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut wallet: Wallet = {
                let guard = wallets
                    .get(wallet_id)?
                    .ok_or_else(|| ServiceError::not_found("Wallet"))?;
                serde_json::from_slice(guard.value())?
            };
            if !wallet.is_active {
                return Err(ServiceError::not_found("Wallet"));
            }
            if wallet.balance < amount {
                return Err(ServiceError::InsufficientFunds {
                    balance: wallet.balance,
                    requested: amount,
                });
            }

            wallet.balance -= amount;
            wallet.updated_at = now;
            wallets.insert(wallet_id, serde_json::to_vec(&wallet)?.as_slice())?;

            let tx_id = next_id(&write_txn, TX_COUNTER)?;
            let tx = Transaction {
                id: tx_id,
                from_wallet_id: Some(wallet_id),
                to_wallet_id: None,
                amount,
                transaction_type: TransactionType::Withdrawal,
                status: TransactionStatus::Completed,
                description: description.to_string(),
                created_at: now,
            };
            let mut txs = write_txn.open_table(TRANSACTIONS)?;
            txs.insert(tx_id, serde_json::to_vec(&tx)?.as_slice())?;

            let mut index = write_txn.open_table(WALLET_TX_INDEX)?;
            index.insert(tx_index_key(wallet_id, now, tx_id).as_slice(), tx_id)?;
            tx
        };
        write_txn.commit()?;
        Ok(tx)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn get_transaction(&self, tx_id: u64) -> Result<Transaction, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let txs = read_txn.open_table(TRANSACTIONS)?;
        let guard = txs
            .get(tx_id)?
            .ok_or_else(|| ServiceError::not_found("Transaction"))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    /// Newest-first transactions touching one wallet, via the composite
    /// index prefix scan.
    pub fn list_wallet_transactions(
        &self,
        wallet_id: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        {
            let wallets = read_txn.open_table(WALLETS)?;
            if wallets.get(wallet_id)?.is_none() {
                return Err(ServiceError::not_found("Wallet"));
            }
        }

        let index = read_txn.open_table(WALLET_TX_INDEX)?;
        let txs_table = read_txn.open_table(TRANSACTIONS)?;
        let start = tx_index_prefix(wallet_id);
        let end = tx_index_prefix_end(wallet_id);

        let mut result = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            if result.len() >= limit {
                break;
            }
            let (_, tx_id_guard) = entry?;
            let tx_id = tx_id_guard.value();
            if let Some(guard) = txs_table.get(tx_id)? {
                result.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(result)
    }

    /// Newest-first transactions touching any wallet the user owns,
    /// including soft-deleted wallets so history never disappears.
    pub fn list_user_transactions(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let read_txn = self.db.begin_read()?;

        let mut wallet_ids = HashSet::new();
        {
            let wallets = read_txn.open_table(WALLETS)?;
            for entry in wallets.iter()? {
                let (_, value) = entry?;
                let wallet: Wallet = serde_json::from_slice(value.value())?;
                if wallet.user_id == user_id {
                    wallet_ids.insert(wallet.id);
                }
            }
        }

        let txs = read_txn.open_table(TRANSACTIONS)?;
        let mut result = Vec::new();
        for entry in txs.iter()?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let tx: Transaction = serde_json::from_slice(value.value())?;
            let involved = tx
                .from_wallet_id
                .map(|id| wallet_ids.contains(&id))
                .unwrap_or(false)
                || tx
                    .to_wallet_id
                    .map(|id| wallet_ids.contains(&id))
                    .unwrap_or(false);
            if involved {
                result.push(tx);
            }
        }
        Ok(result)
    }

    /// Newest-first across the whole ledger. Admin surface only.
    pub fn list_all_transactions(&self, limit: usize) -> Result<Vec<Transaction>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let txs = read_txn.open_table(TRANSACTIONS)?;
        let mut result = Vec::new();
        for entry in txs.iter()?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    // =========================================================================
    // Support tickets
    // =========================================================================

    pub fn create_ticket(
        &self,
        user_id: u64,
        subject: &str,
        message: &str,
        category: TicketCategory,
        priority: TicketPriority,
    ) -> Result<SupportTicket, ServiceError> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let ticket = {
            let users = write_txn.open_table(USERS)?;
            if users.get(user_id)?.is_none() {
                return Err(ServiceError::not_found("User"));
            }

            let mut tickets = write_txn.open_table(TICKETS)?;
            let id = next_id(&write_txn, TICKET_COUNTER)?;
            let ticket = SupportTicket {
                id,
                user_id,
                subject: subject.to_string(),
                message: message.to_string(),
                category,
                priority,
                status: TicketStatus::Open,
                created_at: now,
                updated_at: now,
            };
            tickets.insert(id, serde_json::to_vec(&ticket)?.as_slice())?;
            ticket
        };
        write_txn.commit()?;
        Ok(ticket)
    }

    /// Move a ticket through its lifecycle (open / in_progress / closed).
    pub fn set_ticket_status(
        &self,
        ticket_id: u64,
        status: TicketStatus,
    ) -> Result<SupportTicket, ServiceError> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let ticket = {
            let mut tickets = write_txn.open_table(TICKETS)?;
            let mut ticket: SupportTicket = {
                let guard = tickets
                    .get(ticket_id)?
                    .ok_or_else(|| ServiceError::not_found("Support ticket"))?;
                serde_json::from_slice(guard.value())?
            };
            ticket.status = status;
            ticket.updated_at = now;
            tickets.insert(ticket_id, serde_json::to_vec(&ticket)?.as_slice())?;
            ticket
        };
        write_txn.commit()?;
        Ok(ticket)
    }

    /// The user's tickets, newest first.
    pub fn list_tickets(&self, user_id: u64) -> Result<Vec<SupportTicket>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let tickets = read_txn.open_table(TICKETS)?;
        let mut result = Vec::new();
        for entry in tickets.iter()?.rev() {
            let (_, value) = entry?;
            let ticket: SupportTicket = serde_json::from_slice(value.value())?;
            if ticket.user_id == user_id {
                result.push(ticket);
            }
        }
        Ok(result)
    }

    /// Every ticket, newest first. Admin surface only.
    pub fn list_all_tickets(&self) -> Result<Vec<SupportTicket>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let tickets = read_txn.open_table(TICKETS)?;
        let mut result = Vec::new();
        for entry in tickets.iter()?.rev() {
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Insert or overwrite a session row keyed by its token.
    pub fn put_session(&self, session: &Session) -> Result<(), ServiceError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            sessions.insert(session.token.as_str(), serde_json::to_vec(session)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_session(&self, token: &str) -> Result<Option<Session>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let sessions = read_txn.open_table(SESSIONS)?;
        match sessions.get(token)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a session; returns whether a row existed.
    pub fn delete_session(&self, token: &str) -> Result<bool, ServiceError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let removed = sessions.remove(token)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Delete every session expired at `now`; returns the purge count.
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let mut expired = Vec::new();
            for entry in sessions.iter()? {
                let (key, value) = entry?;
                let session: Session = serde_json::from_slice(value.value())?;
                if session.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }
            for token in &expired {
                sessions.remove(token.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }

    /// Count live session rows (expired-but-unreaped rows included).
    pub fn count_sessions(&self) -> Result<u64, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let sessions = read_txn.open_table(SESSIONS)?;
        let mut count = 0;
        for entry in sessions.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Audit rows
    // =========================================================================

    /// Append an audit event; the store assigns the row id and returns it.
    pub fn append_audit(&self, event: &AuditEvent) -> Result<u64, ServiceError> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let id = next_id(&write_txn, AUDIT_COUNTER)?;
            let mut record = event.clone();
            record.id = id;
            let mut audit = write_txn.open_table(AUDIT_LOG)?;
            audit.insert(id, serde_json::to_vec(&record)?.as_slice())?;
            id
        };
        write_txn.commit()?;
        Ok(id)
    }

    /// Newest-first audit events.
    pub fn list_audit_events(&self, limit: usize) -> Result<Vec<AuditEvent>, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let audit = read_txn.open_table(AUDIT_LOG)?;
        let mut result = Vec::new();
        for entry in audit.iter()?.rev() {
            if result.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn counts(&self) -> Result<LedgerCounts, ServiceError> {
        let read_txn = self.db.begin_read()?;

        let mut users = 0;
        let mut active_users = 0;
        {
            let table = read_txn.open_table(USERS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let user: User = serde_json::from_slice(value.value())?;
                users += 1;
                if user.is_active {
                    active_users += 1;
                }
            }
        }

        let mut wallets = 0;
        let mut active_wallets = 0;
        {
            let table = read_txn.open_table(WALLETS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let wallet: Wallet = serde_json::from_slice(value.value())?;
                wallets += 1;
                if wallet.is_active {
                    active_wallets += 1;
                }
            }
        }

        let mut transactions = 0;
        {
            let table = read_txn.open_table(TRANSACTIONS)?;
            for entry in table.iter()? {
                entry?;
                transactions += 1;
            }
        }

        let mut support_tickets = 0;
        let mut open_tickets = 0;
        {
            let table = read_txn.open_table(TICKETS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let ticket: SupportTicket = serde_json::from_slice(value.value())?;
                support_tickets += 1;
                if ticket.status == TicketStatus::Open {
                    open_tickets += 1;
                }
            }
        }

        let mut sessions = 0;
        {
            let table = read_txn.open_table(SESSIONS)?;
            for entry in table.iter()? {
                entry?;
                sessions += 1;
            }
        }

        Ok(LedgerCounts {
            users,
            active_users,
            wallets,
            active_wallets,
            transactions,
            support_tickets,
            open_tickets,
            sessions,
        })
    }

    pub fn financial_totals(&self) -> Result<FinancialTotals, ServiceError> {
        let read_txn = self.db.begin_read()?;

        let mut total_balance = Decimal::ZERO;
        {
            let table = read_txn.open_table(WALLETS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let wallet: Wallet = serde_json::from_slice(value.value())?;
                if wallet.is_active {
                    total_balance += wallet.balance;
                }
            }
        }

        let mut total_volume = Decimal::ZERO;
        {
            let table = read_txn.open_table(TRANSACTIONS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let tx: Transaction = serde_json::from_slice(value.value())?;
                if tx.status == TransactionStatus::Completed {
                    total_volume += tx.amount;
                }
            }
        }

        Ok(FinancialTotals {
            total_balance,
            total_volume,
        })
    }

    // =========================================================================
    // Bulk export / restore / wipe
    // =========================================================================

    /// Export every ledger row in one consistent read transaction.
    pub fn export_rows(&self) -> Result<LedgerRows, ServiceError> {
        let read_txn = self.db.begin_read()?;
        let mut rows = LedgerRows::default();

        {
            let table = read_txn.open_table(USERS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                rows.users.push(serde_json::from_slice(value.value())?);
            }
        }
        {
            let table = read_txn.open_table(WALLETS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                rows.wallets.push(serde_json::from_slice(value.value())?);
            }
        }
        {
            let table = read_txn.open_table(TRANSACTIONS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                rows.transactions.push(serde_json::from_slice(value.value())?);
            }
        }
        {
            let table = read_txn.open_table(TICKETS)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                rows.support_tickets.push(serde_json::from_slice(value.value())?);
            }
        }

        Ok(rows)
    }

    /// Re-insert exported rows, preserving their ids verbatim.
    ///
    /// Insertion order is users, wallets, transactions, tickets; each row's
    /// references are checked against what is already in the transaction,
    /// so inconsistent input fails validation and rolls the whole restore
    /// back. Identity counters end up past the largest restored id.
    ///
    /// With `clear_existing`, every table (sessions and audit included) is
    /// dropped first, which also invalidates the caller's own session.
    pub fn restore_rows(&self, rows: &LedgerRows, clear_existing: bool) -> Result<(), ServiceError> {
        let write_txn = self.db.begin_write()?;

        if clear_existing {
            write_txn.delete_table(USERS)?;
            write_txn.delete_table(USERS_BY_NAME)?;
            write_txn.delete_table(USERS_BY_EMAIL)?;
            write_txn.delete_table(WALLETS)?;
            write_txn.delete_table(TRANSACTIONS)?;
            write_txn.delete_table(WALLET_TX_INDEX)?;
            write_txn.delete_table(TICKETS)?;
            write_txn.delete_table(SESSIONS)?;
            write_txn.delete_table(AUDIT_LOG)?;
            write_txn.delete_table(COUNTERS)?;
        }

        {
            let mut users = write_txn.open_table(USERS)?;
            let mut by_name = write_txn.open_table(USERS_BY_NAME)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut txs = write_txn.open_table(TRANSACTIONS)?;
            let mut index = write_txn.open_table(WALLET_TX_INDEX)?;
            let mut tickets = write_txn.open_table(TICKETS)?;
            let mut counters = write_txn.open_table(COUNTERS)?;
            // Recreate the remaining tables after a clear so reads keep working.
            write_txn.open_table(SESSIONS)?;
            write_txn.open_table(AUDIT_LOG)?;

            for user in &rows.users {
                if users.get(user.id)?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "duplicate user id {}",
                        user.id
                    )));
                }
                if by_name.get(user.username.as_str())?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "username '{}' already exists",
                        user.username
                    )));
                }
                if by_email.get(user.email.as_str())?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "email '{}' already exists",
                        user.email
                    )));
                }
                users.insert(user.id, serde_json::to_vec(user)?.as_slice())?;
                by_name.insert(user.username.as_str(), user.id)?;
                by_email.insert(user.email.as_str(), user.id)?;
            }

            for wallet in &rows.wallets {
                if users.get(wallet.user_id)?.is_none() {
                    return Err(ServiceError::validation(format!(
                        "wallet {} references missing user {}",
                        wallet.id, wallet.user_id
                    )));
                }
                if wallets.get(wallet.id)?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "duplicate wallet id {}",
                        wallet.id
                    )));
                }
                wallets.insert(wallet.id, serde_json::to_vec(wallet)?.as_slice())?;
            }

            for tx in &rows.transactions {
                for wallet_id in [tx.from_wallet_id, tx.to_wallet_id].into_iter().flatten() {
                    if wallets.get(wallet_id)?.is_none() {
                        return Err(ServiceError::validation(format!(
                            "transaction {} references missing wallet {}",
                            tx.id, wallet_id
                        )));
                    }
                }
                if txs.get(tx.id)?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "duplicate transaction id {}",
                        tx.id
                    )));
                }
                txs.insert(tx.id, serde_json::to_vec(tx)?.as_slice())?;
                for wallet_id in [tx.from_wallet_id, tx.to_wallet_id].into_iter().flatten() {
                    index.insert(tx_index_key(wallet_id, tx.created_at, tx.id).as_slice(), tx.id)?;
                }
            }

            for ticket in &rows.support_tickets {
                if users.get(ticket.user_id)?.is_none() {
                    return Err(ServiceError::validation(format!(
                        "ticket {} references missing user {}",
                        ticket.id, ticket.user_id
                    )));
                }
                if tickets.get(ticket.id)?.is_some() {
                    return Err(ServiceError::validation(format!(
                        "duplicate ticket id {}",
                        ticket.id
                    )));
                }
                tickets.insert(ticket.id, serde_json::to_vec(ticket)?.as_slice())?;
            }

            bump_counter(&mut counters, USER_COUNTER, rows.users.iter().map(|u| u.id).max())?;
            bump_counter(
                &mut counters,
                WALLET_COUNTER,
                rows.wallets.iter().map(|w| w.id).max(),
            )?;
            bump_counter(
                &mut counters,
                TX_COUNTER,
                rows.transactions.iter().map(|t| t.id).max(),
            )?;
            bump_counter(
                &mut counters,
                TICKET_COUNTER,
                rows.support_tickets.iter().map(|t| t.id).max(),
            )?;
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Drop every table and recreate them empty, counters included. New
    /// rows start from id 1 again.
    pub fn wipe_all(&self) -> Result<(), ServiceError> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(USERS)?;
        write_txn.delete_table(USERS_BY_NAME)?;
        write_txn.delete_table(USERS_BY_EMAIL)?;
        write_txn.delete_table(WALLETS)?;
        write_txn.delete_table(TRANSACTIONS)?;
        write_txn.delete_table(WALLET_TX_INDEX)?;
        write_txn.delete_table(TICKETS)?;
        write_txn.delete_table(SESSIONS)?;
        write_txn.delete_table(AUDIT_LOG)?;
        write_txn.delete_table(COUNTERS)?;
        {
            write_txn.open_table(USERS)?;
            write_txn.open_table(USERS_BY_NAME)?;
            write_txn.open_table(USERS_BY_EMAIL)?;
            write_txn.open_table(WALLETS)?;
            write_txn.open_table(TRANSACTIONS)?;
            write_txn.open_table(WALLET_TX_INDEX)?;
            write_txn.open_table(TICKETS)?;
            write_txn.open_table(SESSIONS)?;
            write_txn.open_table(AUDIT_LOG)?;
            write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Allocate the next id from a named counter within the caller's write
/// transaction, so an aborted operation never burns an id.
fn next_id(write_txn: &redb::WriteTransaction, counter: &str) -> Result<u64, ServiceError> {
    let mut counters = write_txn.open_table(COUNTERS)?;
    let next = match counters.get(counter)? {
        Some(guard) => guard.value() + 1,
        None => 1,
    };
    counters.insert(counter, next)?;
    Ok(next)
}

fn bump_counter(
    counters: &mut redb::Table<'_, &'static str, u64>,
    counter: &str,
    max_id: Option<u64>,
) -> Result<(), ServiceError> {
    let max_id = match max_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let current = match counters.get(counter)? {
        Some(guard) => guard.value(),
        None => 0,
    };
    if max_id > current {
        counters.insert(counter, max_id)?;
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation("Amount must be positive"));
    }
    if amount.normalize().scale() > 2 {
        return Err(ServiceError::validation(
            "Amount precision is limited to 2 decimal places",
        ));
    }
    Ok(())
}

/// Composite index key: `wallet_id | !created_at_micros | !tx_id`.
fn tx_index_key(wallet_id: u64, created_at: DateTime<Utc>, tx_id: u64) -> Vec<u8> {
    let micros = created_at.timestamp_micros().max(0) as u64;
    let mut key = Vec::with_capacity(26);
    key.extend_from_slice(&wallet_id.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!micros).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!tx_id).to_be_bytes());
    key
}

fn tx_index_prefix(wallet_id: u64) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(9);
    prefix.extend_from_slice(&wallet_id.to_be_bytes());
    prefix.push(b'|');
    prefix
}

fn tx_index_prefix_end(wallet_id: u64) -> Vec<u8> {
    let mut end = tx_index_prefix(wallet_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn temp_store() -> (WalletStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = WalletStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    fn funded_wallet(store: &WalletStore, username: &str, balance: Decimal) -> Wallet {
        let user = store
            .insert_user(username, &format!("{username}@example.com"), "hash", false)
            .unwrap();
        store
            .create_wallet_with_balance(user.id, "Main Wallet", "USD", balance)
            .unwrap()
    }

    #[test]
    fn tx_index_key_orders_newest_first() {
        let older = Utc::now();
        let newer = older + Duration::seconds(5);

        let key_old = tx_index_key(1, older, 1);
        let key_new = tx_index_key(1, newer, 2);
        // Ascending byte order must put the newer entry first.
        assert!(key_new < key_old);

        // Same timestamp: the higher (newer) id sorts first.
        let key_a = tx_index_key(1, older, 3);
        let key_b = tx_index_key(1, older, 4);
        assert!(key_b < key_a);
    }

    #[test]
    fn tx_index_prefix_isolates_one_wallet() {
        let key = tx_index_key(2, Utc::now(), 9);
        let start = tx_index_prefix(2);
        let end = tx_index_prefix_end(2);
        assert!(key.as_slice() >= start.as_slice());
        assert!(key.as_slice() < end.as_slice());

        let other = tx_index_key(3, Utc::now(), 9);
        assert!(other.as_slice() >= end.as_slice());
    }

    #[test]
    fn insert_user_enforces_unique_username_and_email() {
        let (store, _dir) = temp_store();
        let user = store
            .insert_user("alice", "alice@example.com", "h1", false)
            .unwrap();
        assert_eq!(user.id, 1);
        assert!(user.is_active);

        let dup_name = store.insert_user("alice", "other@example.com", "h2", false);
        assert!(matches!(dup_name, Err(ServiceError::Validation(_))));

        let dup_email = store.insert_user("bob", "alice@example.com", "h3", false);
        assert!(matches!(dup_email, Err(ServiceError::Validation(_))));

        // The failed inserts must not have burned ids.
        let next = store
            .insert_user("carol", "carol@example.com", "h4", false)
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn update_user_moves_unique_indexes() {
        let (store, _dir) = temp_store();
        let user = store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();

        let renamed = store
            .update_user(
                user.id,
                UserUpdate {
                    username: Some("alicia".to_string()),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.username, "alicia");

        assert!(store.get_user_by_username("alice").unwrap().is_none());
        assert_eq!(
            store.get_user_by_username("alicia").unwrap().unwrap().id,
            user.id
        );

        // The freed name is usable again.
        store
            .insert_user("alice", "alice2@example.com", "h", false)
            .unwrap();
    }

    #[test]
    fn ids_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let store = WalletStore::open(&path).unwrap();
            store
                .insert_user("alice", "alice@example.com", "h", false)
                .unwrap();
        }
        let store = WalletStore::open(&path).unwrap();
        let user = store
            .insert_user("bob", "bob@example.com", "h", false)
            .unwrap();
        assert_eq!(user.id, 2);
    }

    #[test]
    fn transfer_moves_funds_and_conserves_total() {
        let (store, _dir) = temp_store();
        let source = funded_wallet(&store, "alice", dec!(100.00));
        let dest = funded_wallet(&store, "bob", dec!(50.00));

        let tx = store
            .transfer(source.id, dest.id, dec!(30.00), "rent")
            .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Transfer);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.from_wallet_id, Some(source.id));
        assert_eq!(tx.to_wallet_id, Some(dest.id));

        let source_after = store.get_wallet(source.id).unwrap();
        let dest_after = store.get_wallet(dest.id).unwrap();
        assert_eq!(source_after.balance, dec!(70.00));
        assert_eq!(dest_after.balance, dec!(80.00));
        assert_eq!(
            source_after.balance + dest_after.balance,
            source.balance + dest.balance
        );
    }

    #[test]
    fn transfer_insufficient_funds_has_no_side_effects() {
        let (store, _dir) = temp_store();
        let source = funded_wallet(&store, "alice", dec!(10.00));
        let dest = funded_wallet(&store, "bob", dec!(0.00));

        let result = store.transfer(source.id, dest.id, dec!(25.00), "too much");
        assert!(matches!(
            result,
            Err(ServiceError::InsufficientFunds { .. })
        ));

        assert_eq!(store.get_wallet(source.id).unwrap().balance, dec!(10.00));
        assert_eq!(store.get_wallet(dest.id).unwrap().balance, dec!(0.00));
        assert!(store.list_all_transactions(10).unwrap().is_empty());
    }

    #[test]
    fn transfer_rejects_bad_amounts_and_self_transfer() {
        let (store, _dir) = temp_store();
        let source = funded_wallet(&store, "alice", dec!(100.00));
        let dest = funded_wallet(&store, "bob", dec!(0.00));

        assert!(matches!(
            store.transfer(source.id, dest.id, dec!(0.00), ""),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            store.transfer(source.id, dest.id, dec!(-5.00), ""),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            store.transfer(source.id, dest.id, dec!(1.005), ""),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            store.transfer(source.id, source.id, dec!(5.00), ""),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn transfer_to_deleted_wallet_is_not_found() {
        let (store, _dir) = temp_store();
        let source = funded_wallet(&store, "alice", dec!(100.00));
        let dest = funded_wallet(&store, "bob", dec!(0.00));
        store.delete_wallet(dest.id).unwrap();

        let result = store.transfer(source.id, dest.id, dec!(5.00), "");
        match result {
            Err(ServiceError::NotFound(entity)) => assert_eq!(entity, "Destination wallet"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn deposit_and_withdraw_record_directional_rows() {
        let (store, _dir) = temp_store();
        let wallet = funded_wallet(&store, "alice", dec!(100.00));

        let deposit = store.deposit(wallet.id, dec!(40.00), "payday").unwrap();
        assert_eq!(deposit.from_wallet_id, None);
        assert_eq!(deposit.to_wallet_id, Some(wallet.id));
        assert_eq!(deposit.transaction_type, TransactionType::Deposit);

        let withdrawal = store.withdraw(wallet.id, dec!(25.00), "atm").unwrap();
        assert_eq!(withdrawal.from_wallet_id, Some(wallet.id));
        assert_eq!(withdrawal.to_wallet_id, None);
        assert_eq!(withdrawal.transaction_type, TransactionType::Withdrawal);

        assert_eq!(store.get_wallet(wallet.id).unwrap().balance, dec!(115.00));

        let overdraw = store.withdraw(wallet.id, dec!(1000.00), "");
        assert!(matches!(
            overdraw,
            Err(ServiceError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn wallet_transactions_are_newest_first_and_limited() {
        let (store, _dir) = temp_store();
        let wallet = funded_wallet(&store, "alice", dec!(0.00));

        store.deposit(wallet.id, dec!(1.00), "first").unwrap();
        store.deposit(wallet.id, dec!(2.00), "second").unwrap();
        store.deposit(wallet.id, dec!(3.00), "third").unwrap();

        let all = store.list_wallet_transactions(wallet.id, 50).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "third");
        assert_eq!(all[2].description, "first");

        let limited = store.list_wallet_transactions(wallet.id, 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].description, "third");

        assert!(matches!(
            store.list_wallet_transactions(999, 10),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn user_transactions_span_all_owned_wallets() {
        let (store, _dir) = temp_store();
        let alice = store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        let w1 = store
            .create_wallet_with_balance(alice.id, "Checking", "USD", dec!(100.00))
            .unwrap();
        let w2 = store
            .create_wallet_with_balance(alice.id, "Savings", "USD", dec!(0.00))
            .unwrap();
        let bob_wallet = funded_wallet(&store, "bob", dec!(100.00));

        store.deposit(w2.id, dec!(10.00), "into savings").unwrap();
        store.transfer(w1.id, bob_wallet.id, dec!(20.00), "to bob").unwrap();
        store.deposit(bob_wallet.id, dec!(5.00), "bob only").unwrap();

        let mine = store.list_user_transactions(alice.id, 50).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].description, "to bob");
        assert_eq!(mine[1].description, "into savings");
    }

    #[test]
    fn soft_deleted_wallet_is_hidden_but_history_remains() {
        let (store, _dir) = temp_store();
        let alice = store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        let wallet = store
            .create_wallet_with_balance(alice.id, "Main", "USD", dec!(50.00))
            .unwrap();
        store.deposit(wallet.id, dec!(10.00), "before delete").unwrap();

        let deleted = store.delete_wallet(wallet.id).unwrap();
        assert!(!deleted.is_active);

        // Hidden from active listings, still fetchable by id.
        assert!(store.list_wallets(alice.id).unwrap().is_empty());
        assert!(!store.get_wallet(wallet.id).unwrap().is_active);

        // History survives and money operations are refused.
        assert_eq!(store.list_wallet_transactions(wallet.id, 10).unwrap().len(), 1);
        assert!(matches!(
            store.deposit(wallet.id, dec!(1.00), ""),
            Err(ServiceError::NotFound(_))
        ));

        // Deleting again is a no-op, and reactivation works.
        store.delete_wallet(wallet.id).unwrap();
        let revived = store
            .update_wallet(
                wallet.id,
                WalletUpdate {
                    is_active: Some(true),
                    ..WalletUpdate::default()
                },
            )
            .unwrap();
        assert!(revived.is_active);
    }

    #[test]
    fn tickets_roundtrip_newest_first() {
        let (store, _dir) = temp_store();
        let user = store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();

        store
            .create_ticket(
                user.id,
                "First",
                "body",
                TicketCategory::Account,
                TicketPriority::Low,
            )
            .unwrap();
        let second = store
            .create_ticket(
                user.id,
                "Second",
                "body",
                TicketCategory::Security,
                TicketPriority::High,
            )
            .unwrap();
        assert_eq!(second.status, TicketStatus::Open);

        let tickets = store.list_tickets(user.id).unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].subject, "Second");

        assert!(matches!(
            store.create_ticket(999, "x", "y", TicketCategory::General, TicketPriority::Low),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn sessions_roundtrip_and_reap() {
        let (store, _dir) = temp_store();
        let user = store
            .insert_user("alice", "alice@example.com", "h", false)
            .unwrap();
        let now = Utc::now();

        let live = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::minutes(30),
            created_at: now,
        };
        let stale = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now - Duration::minutes(1),
            created_at: now - Duration::minutes(31),
        };
        store.put_session(&live).unwrap();
        store.put_session(&stale).unwrap();
        assert_eq!(store.count_sessions().unwrap(), 2);

        let purged = store.delete_expired_sessions(now).unwrap();
        assert_eq!(purged, 1);
        assert!(store.get_session(&stale.token).unwrap().is_none());
        assert!(store.get_session(&live.token).unwrap().is_some());

        assert!(store.delete_session(&live.token).unwrap());
        assert!(!store.delete_session(&live.token).unwrap());
    }

    #[test]
    fn audit_rows_append_and_list_newest_first() {
        let (store, _dir) = temp_store();
        let first = store
            .append_audit(&AuditEvent::new(super::super::AuditEventType::UserLogin).with_user(1))
            .unwrap();
        let second = store
            .append_audit(&AuditEvent::new(super::super::AuditEventType::UserLogout).with_user(1))
            .unwrap();
        assert!(second > first);

        let events = store.list_audit_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, second);
    }

    #[test]
    fn counts_and_totals_reflect_ledger_state() {
        let (store, _dir) = temp_store();
        let w1 = funded_wallet(&store, "alice", dec!(100.00));
        let w2 = funded_wallet(&store, "bob", dec!(50.00));
        store.transfer(w1.id, w2.id, dec!(25.00), "x").unwrap();
        store.delete_wallet(w2.id).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.users, 2);
        assert_eq!(counts.wallets, 2);
        assert_eq!(counts.active_wallets, 1);
        assert_eq!(counts.transactions, 1);

        let totals = store.financial_totals().unwrap();
        assert_eq!(totals.total_balance, dec!(75.00));
        assert_eq!(totals.total_volume, dec!(25.00));
    }

    #[test]
    fn wipe_all_resets_identity_counters() {
        let (store, _dir) = temp_store();
        funded_wallet(&store, "alice", dec!(10.00));
        store.wipe_all().unwrap();

        assert!(store.list_users().unwrap().is_empty());
        let user = store
            .insert_user("fresh", "fresh@example.com", "h", false)
            .unwrap();
        assert_eq!(user.id, 1);
    }

    #[test]
    fn restore_preserves_ids_and_bumps_counters() {
        let (store, _dir) = temp_store();
        let w1 = funded_wallet(&store, "alice", dec!(100.00));
        let w2 = funded_wallet(&store, "bob", dec!(50.00));
        store.transfer(w1.id, w2.id, dec!(10.00), "seed").unwrap();
        let exported = store.export_rows().unwrap();

        let (restored_store, _dir2) = temp_store();
        restored_store.restore_rows(&exported, true).unwrap();

        assert_eq!(restored_store.get_wallet(w1.id).unwrap().balance, dec!(90.00));
        let txs = restored_store.list_wallet_transactions(w1.id, 10).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].description, "seed");

        // New ids continue past the restored ones.
        let user = restored_store
            .insert_user("carol", "carol@example.com", "h", false)
            .unwrap();
        assert_eq!(user.id, 3);
    }

    #[test]
    fn restore_rolls_back_atomically_on_bad_reference() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let rows = LedgerRows {
            users: vec![User {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "h".to_string(),
                is_admin: false,
                is_active: true,
                created_at: now,
                updated_at: now,
            }],
            wallets: vec![Wallet {
                id: 1,
                user_id: 99,
                wallet_name: "Orphan".to_string(),
                balance: dec!(10.00),
                currency: "USD".to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            }],
            transactions: Vec::new(),
            support_tickets: Vec::new(),
        };

        let result = store.restore_rows(&rows, false);
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        // The valid user insert must have rolled back with the rest.
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn search_users_is_case_insensitive_and_skips_inactive() {
        let (store, _dir) = temp_store();
        store
            .insert_user("Alice", "alice@example.com", "h", false)
            .unwrap();
        let bob = store
            .insert_user("bob_alicefan", "bob@example.com", "h", false)
            .unwrap();
        store.set_user_active(bob.id, false).unwrap();

        let hits = store.search_users("ALICE", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "Alice");
    }
}
