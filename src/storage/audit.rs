// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Events are recorded twice: as rows in the redb audit table (queryable
//! from the admin surface) and as JSONL lines in a daily file, one JSON
//! object per line, for offline inspection.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::StoreError;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    UserRegistered,
    UserLogin,
    UserLoginFailed,
    UserLogout,
    UserUpdated,
    UserStatusChanged,
    UserRoleChanged,

    // Wallet events
    WalletCreated,
    WalletUpdated,
    WalletDeleted,

    // Ledger events
    FundsTransferred,
    FundsDeposited,
    FundsWithdrawn,

    // Support events
    TicketCreated,

    // Admin events
    AdminAccess,
    SessionsReaped,

    // Data management events
    SnapshotCreated,
    SnapshotRestored,
    DataWiped,
    DemoDataSeeded,

    // Teaching surface
    VulnerabilityInvoked,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Row id, assigned by the store when the event is appended.
    #[serde(default)]
    pub id: u64,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<u64>,
    /// Resource affected (wallet id, snapshot version, etc.).
    pub resource_id: Option<String>,
    /// Resource type (wallet, user, snapshot, etc.).
    pub resource_type: Option<String>,
    /// IP address of the request (if available).
    pub ip_address: Option<String>,
    /// User agent of the request (if available).
    pub user_agent: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            ip_address: None,
            user_agent: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Set the IP address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Daily JSONL mirror of the audit table.
pub struct AuditFileLog {
    dir: PathBuf,
}

impl AuditFileLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Append an event to the file for its own timestamp's date.
    pub fn append(&self, event: &AuditEvent) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_for(event.timestamp.date_naive());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read all events logged on the given date. Malformed lines are
    /// skipped with a warning rather than failing the whole read.
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<AuditEvent>, StoreError> {
        let path = self.file_for(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    tracing::warn!(error = %err, path = %path.display(), "Skipping malformed audit line");
                }
            }
        }
        Ok(events)
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("audit-{}.jsonl", date.format("%Y-%m-%d")))
    }
}

/// Helper macro for logging audit events through the application state.
///
/// Failures to record are logged and swallowed; auditing must never fail
/// the operation being audited.
#[macro_export]
macro_rules! audit_log {
    ($state:expr, $event:expr) => {{
        if let Err(err) = $state.record_audit(&$event) {
            ::tracing::warn!(error = %err, "Failed to record audit event");
        }
    }};
    ($state:expr, $event_type:expr, $user:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type).with_user($user.user_id);
        $crate::audit_log!($state, event);
    }};
    ($state:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user($user.user_id)
            .with_resource($resource_type, $resource_id);
        $crate::audit_log!($state, event);
    }};
}
