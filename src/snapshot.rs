// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Versioned ledger snapshots and demo fixtures.
//!
//! A snapshot is one self-describing JSON file, `snapshot_{version}.json`
//! in the configured directory, holding every user, wallet, transaction,
//! and support ticket row plus a version, description, and UTC creation
//! timestamp. Snapshots are files, not ledger rows: wiping the ledger
//! leaves them listable.
//!
//! Restore re-inserts parents before children (users, then wallets, then
//! transactions and tickets) inside a single store write transaction, so
//! a failing restore leaves the current ledger untouched and concurrent
//! reads never observe a half-restored state. Row ids are preserved
//! verbatim and the id counters end up past the largest restored id.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{
    SupportTicket, TicketCategory, TicketPriority, TicketStatus, Transaction, User, Wallet,
};
use crate::storage::{LedgerRows, WalletStore};

// =============================================================================
// Snapshot documents
// =============================================================================

/// A parsed snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SnapshotDocument {
    pub version: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub data: SnapshotData,
}

/// The row payload of a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SnapshotData {
    pub users: Vec<SnapshotUser>,
    #[schema(value_type = Vec<Wallet>)]
    pub wallets: Vec<Wallet>,
    #[schema(value_type = Vec<Transaction>)]
    pub transactions: Vec<Transaction>,
    #[schema(value_type = Vec<SupportTicket>)]
    pub support_tickets: Vec<SupportTicket>,
}

/// A user row as it appears in a snapshot file.
///
/// Exported rows always carry `password_hash`. Hand-written fixture files
/// may supply a plaintext `password` instead, which restore hashes on the
/// way in; a stored hash is reused verbatim so that an exported snapshot
/// round-trips row-for-row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SnapshotUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for SnapshotUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: None,
            password_hash: Some(user.password_hash.clone()),
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// One line of the snapshot listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SnapshotInfo {
    pub version: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub user_count: usize,
    pub wallet_count: usize,
    pub transaction_count: usize,
    pub ticket_count: usize,
}

/// Outcome of seeding the demo fixture.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeedReport {
    pub users: usize,
    pub wallets: usize,
    pub transactions: usize,
    pub support_tickets: usize,
    /// username -> plaintext password, for the training UI.
    pub credentials: BTreeMap<String, String>,
}

// =============================================================================
// Manager
// =============================================================================

/// File-backed snapshot manager over the ledger store.
pub struct SnapshotManager {
    dir: PathBuf,
    store: Arc<WalletStore>,
}

impl SnapshotManager {
    pub fn new(dir: impl Into<PathBuf>, store: Arc<WalletStore>) -> Self {
        Self {
            dir: dir.into(),
            store,
        }
    }

    fn file_for(&self, version: &str) -> PathBuf {
        self.dir.join(format!("snapshot_{version}.json"))
    }

    /// Export every ledger row into a version-qualified snapshot file.
    /// An existing file for the same version is overwritten silently.
    pub fn create_snapshot(
        &self,
        version: &str,
        description: &str,
    ) -> Result<SnapshotDocument, ServiceError> {
        validate_version(version)?;

        let rows = self.store.export_rows()?;
        let document = SnapshotDocument {
            version: version.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            data: SnapshotData {
                users: rows.users.iter().map(SnapshotUser::from).collect(),
                wallets: rows.wallets,
                transactions: rows.transactions,
                support_tickets: rows.support_tickets,
            },
        };

        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(&document)?;
        std::fs::write(self.file_for(version), json)?;

        tracing::info!(
            version,
            users = document.data.users.len(),
            wallets = document.data.wallets.len(),
            transactions = document.data.transactions.len(),
            "Snapshot created"
        );
        Ok(document)
    }

    /// Parse the named snapshot file, or NotFound if it does not exist.
    pub fn load_snapshot(&self, version: &str) -> Result<SnapshotDocument, ServiceError> {
        validate_version(version)?;
        let path = self.file_for(version);
        if !path.exists() {
            return Err(ServiceError::not_found("Snapshot"));
        }
        let content = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Enumerate every snapshot file, newest first.
    ///
    /// Unparseable files are skipped with a warning rather than failing
    /// the whole listing.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, ServiceError> {
        let mut snapshots = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
            Err(err) => return Err(ServiceError::Persistence(err.into())),
        };

        for entry in entries {
            let entry = entry.map_err(|e| ServiceError::Persistence(e.into()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(version) = name
                .strip_prefix("snapshot_")
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };

            match self.load_snapshot(version) {
                Ok(document) => snapshots.push(SnapshotInfo {
                    version: document.version,
                    description: document.description,
                    created_at: document.created_at,
                    user_count: document.data.users.len(),
                    wallet_count: document.data.wallets.len(),
                    transaction_count: document.data.transactions.len(),
                    ticket_count: document.data.support_tickets.len(),
                }),
                Err(err) => {
                    tracing::warn!(version, error = %err, "Skipping unreadable snapshot file");
                }
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    /// Replace (or merge into) the ledger from the named snapshot.
    ///
    /// The whole restore is a single store write transaction: any bad row
    /// rolls everything back, including the `clear_existing` wipe.
    pub fn restore_snapshot(
        &self,
        version: &str,
        clear_existing: bool,
    ) -> Result<SnapshotInfo, ServiceError> {
        let document = self.load_snapshot(version)?;

        let mut users = Vec::with_capacity(document.data.users.len());
        for row in &document.data.users {
            users.push(materialize_user(row)?);
        }

        let rows = LedgerRows {
            users,
            wallets: document.data.wallets.clone(),
            transactions: document.data.transactions.clone(),
            support_tickets: document.data.support_tickets.clone(),
        };
        self.store.restore_rows(&rows, clear_existing)?;

        tracing::info!(version, clear_existing, "Snapshot restored");
        Ok(SnapshotInfo {
            version: document.version,
            description: document.description,
            created_at: document.created_at,
            user_count: rows.users.len(),
            wallet_count: rows.wallets.len(),
            transaction_count: rows.transactions.len(),
            ticket_count: rows.support_tickets.len(),
        })
    }

    /// Wipe the ledger and load the deterministic demo fixture.
    ///
    /// The fixed transfers run through the regular ledger operations, so
    /// the resulting balances reflect the movements: the admin wallet
    /// opens at 10000.00 and ends at 7000.00 after the three welcome
    /// bonuses.
    pub fn seed_demo_data(&self) -> Result<SeedReport, ServiceError> {
        self.store.wipe_all()?;

        let demo_users: [(&str, &str, &str, bool); 5] = [
            ("admin", "admin@vulnwallet.dev", "admin123", true),
            ("john", "john@example.com", "password123", false),
            ("jane", "jane@example.com", "password123", false),
            ("bob", "bob@example.com", "password123", false),
            ("demo", "demo@vulnwallet.dev", "demo123", false),
        ];
        let mut credentials = BTreeMap::new();
        let mut user_ids = Vec::new();
        for (username, email, password, is_admin) in demo_users {
            let user =
                self.store
                    .insert_user(username, email, &hash_password(password), is_admin)?;
            credentials.insert(username.to_string(), password.to_string());
            user_ids.push(user.id);
        }

        let demo_wallets = [
            (user_ids[0], "Admin Wallet", dec!(10000.00)),
            (user_ids[1], "John's Wallet", dec!(5000.00)),
            (user_ids[2], "Jane's Wallet", dec!(7500.00)),
            (user_ids[3], "Bob's Wallet", dec!(3000.00)),
            (user_ids[4], "Demo Wallet", dec!(1000.00)),
        ];
        let mut wallet_ids = Vec::new();
        for (user_id, name, balance) in demo_wallets {
            let wallet = self
                .store
                .create_wallet_with_balance(user_id, name, "USD", balance)?;
            wallet_ids.push(wallet.id);
        }

        self.store
            .transfer(wallet_ids[0], wallet_ids[1], dec!(1000.00), "Welcome bonus")?;
        self.store
            .transfer(wallet_ids[0], wallet_ids[2], dec!(1000.00), "Welcome bonus")?;
        self.store
            .transfer(wallet_ids[0], wallet_ids[3], dec!(1000.00), "Welcome bonus")?;
        self.store.transfer(
            wallet_ids[1],
            wallet_ids[2],
            dec!(500.00),
            "Payment for services",
        )?;
        self.store.transfer(
            wallet_ids[2],
            wallet_ids[3],
            dec!(250.00),
            "Shared expenses",
        )?;
        self.store
            .deposit(wallet_ids[4], dec!(1000.00), "Initial deposit")?;

        let demo_tickets = [
            (
                user_ids[1],
                "Account verification",
                "I need help with account verification",
                TicketCategory::Account,
                TicketPriority::Medium,
                TicketStatus::Open,
            ),
            (
                user_ids[2],
                "Transaction issue",
                "My transaction is pending for too long",
                TicketCategory::Transaction,
                TicketPriority::High,
                TicketStatus::InProgress,
            ),
            (
                user_ids[3],
                "Password reset",
                "I forgot my password",
                TicketCategory::Security,
                TicketPriority::Low,
                TicketStatus::Closed,
            ),
        ];
        for (user_id, subject, message, category, priority, status) in demo_tickets {
            let ticket = self
                .store
                .create_ticket(user_id, subject, message, category, priority)?;
            // create_ticket always opens tickets; the fixture pins some
            // into later lifecycle states.
            if status != TicketStatus::Open {
                self.store.set_ticket_status(ticket.id, status)?;
            }
        }

        tracing::info!("Demo data seeded");
        Ok(SeedReport {
            users: demo_users.len(),
            wallets: demo_wallets.len(),
            transactions: 6,
            support_tickets: demo_tickets.len(),
            credentials,
        })
    }

    /// The demo credential map without reseeding anything.
    pub fn demo_credentials() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("admin".to_string(), "admin123".to_string()),
            ("john".to_string(), "password123".to_string()),
            ("jane".to_string(), "password123".to_string()),
            ("bob".to_string(), "password123".to_string()),
            ("demo".to_string(), "demo123".to_string()),
        ])
    }

    /// Create the configured admin account if it does not exist yet.
    /// Returns whether a new account was created.
    pub fn bootstrap_admin(&self, config: &Config) -> Result<bool, ServiceError> {
        if self
            .store
            .get_user_by_username(&config.admin_username)?
            .is_some()
        {
            return Ok(false);
        }
        self.store.insert_user(
            &config.admin_username,
            &config.admin_email,
            &hash_password(&config.admin_password),
            true,
        )?;
        tracing::info!(username = %config.admin_username, "Bootstrapped admin account");
        Ok(true)
    }

    /// Grant the named user the admin flag.
    pub fn promote_to_admin(&self, username: &str) -> Result<User, ServiceError> {
        let user = self
            .store
            .get_user_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        self.store.set_user_admin(user.id, true)
    }

    /// Delete every ledger row and reset the id counters. Snapshot files
    /// are untouched.
    pub fn wipe_all(&self) -> Result<(), ServiceError> {
        self.store.wipe_all()?;
        tracing::warn!("All ledger data wiped");
        Ok(())
    }
}

/// Turn a snapshot user row into a ledger row, resolving its credential.
fn materialize_user(row: &SnapshotUser) -> Result<User, ServiceError> {
    let password_hash = match (&row.password_hash, &row.password) {
        // A stored hash wins, verbatim, so exports round-trip exactly.
        (Some(hash), _) => hash.clone(),
        (None, Some(plaintext)) => hash_password(plaintext),
        (None, None) => {
            return Err(ServiceError::validation(format!(
                "user '{}' has neither password nor password_hash",
                row.username
            )))
        }
    };
    Ok(User {
        id: row.id,
        username: row.username.clone(),
        email: row.email.clone(),
        password_hash,
        is_admin: row.is_admin,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Versions become file names; keep them to a safe character set.
fn validate_version(version: &str) -> Result<(), ServiceError> {
    if version.is_empty() || version.len() > 64 {
        return Err(ServiceError::validation(
            "Snapshot version must be 1-64 characters",
        ));
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ServiceError::validation(
            "Snapshot version may only contain letters, digits, '.', '-', '_'",
        ));
    }
    Ok(())
}
