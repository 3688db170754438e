// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state handed to every handler.

use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::ServiceError;
use crate::snapshot::SnapshotManager;
use crate::storage::{AuditEvent, AuditFileLog, WalletStore};
use crate::vuln::xss::CommentBoard;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<WalletStore>,
    pub snapshots: Arc<SnapshotManager>,
    pub audit_files: Arc<AuditFileLog>,
    /// Stored-XSS exercise comments. Fixture data, deliberately not part
    /// of the ledger.
    pub xss_comments: Arc<Mutex<CommentBoard>>,
}

impl AppState {
    /// Open the store and wire up the managers. Fails only if the
    /// database cannot be opened.
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.snapshot_dir)?;
        std::fs::create_dir_all(&config.audit_log_dir)?;
        let store = Arc::new(WalletStore::open(&config.db_path())?);
        let snapshots = Arc::new(SnapshotManager::new(
            config.snapshot_dir.clone(),
            Arc::clone(&store),
        ));
        let audit_files = Arc::new(AuditFileLog::new(config.audit_log_dir.clone()));
        Ok(Self {
            config: Arc::new(config),
            store,
            snapshots,
            audit_files,
            xss_comments: Arc::new(Mutex::new(CommentBoard::default())),
        })
    }

    /// Record an audit event in the store table and the daily JSONL
    /// mirror. Callers go through the `audit_log!` macro, which logs and
    /// swallows failures.
    pub fn record_audit(&self, event: &AuditEvent) -> Result<(), ServiceError> {
        self.store.append_audit(event)?;
        self.audit_files.append(event)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::AuditEventType;

    pub(crate) fn temp_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            snapshot_dir: dir.path().join("snapshots"),
            audit_log_dir: dir.path().join("audit"),
            ..Config::default()
        };
        (AppState::new(config).unwrap(), dir)
    }

    #[test]
    fn record_audit_lands_in_table_and_file() {
        let (state, _dir) = temp_state();
        let event = AuditEvent::new(AuditEventType::AdminAccess).with_user(1);
        state.record_audit(&event).unwrap();

        let rows = state.store.list_audit_events(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, AuditEventType::AdminAccess);

        let lines = state
            .audit_files
            .read_day(chrono::Utc::now().date_naive())
            .unwrap();
        assert_eq!(lines.len(), 1);
    }
}
