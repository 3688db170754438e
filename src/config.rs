// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Unset or
//! unparseable values fall back to their defaults with a warning; the
//! server always comes up.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the redb database | `./data` |
//! | `SNAPSHOT_DIR` | Directory for snapshot JSON files | `<DATA_DIR>/snapshots` |
//! | `AUDIT_LOG_DIR` | Directory for JSONL audit files | `<DATA_DIR>/audit` |
//! | `SESSION_TTL_MINUTES` | Session lifetime in minutes | `30` |
//! | `VULN_LEVEL` | Enabled teaching tier (`basic`/`medium`/`hard`/`expert`) | `basic` |
//! | `ADMIN_USERNAME` | Bootstrap admin username | `admin` |
//! | `ADMIN_EMAIL` | Bootstrap admin email | `admin@vulnwallet.dev` |
//! | `ADMIN_PASSWORD` | Bootstrap admin password | `admin123` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

use crate::vuln::VulnLevel;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the snapshot directory path.
pub const SNAPSHOT_DIR_ENV: &str = "SNAPSHOT_DIR";

/// Environment variable name for the audit log directory path.
pub const AUDIT_LOG_DIR_ENV: &str = "AUDIT_LOG_DIR";

/// Environment variable name for the session TTL in minutes.
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_MINUTES";

/// Environment variable name for the enabled vulnerability tier.
pub const VULN_LEVEL_ENV: &str = "VULN_LEVEL";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filename of the redb database inside the data directory.
pub const DB_FILENAME: &str = "vulnwallet.redb";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub audit_log_dir: PathBuf,
    pub session_ttl_minutes: i64,
    /// Highest teaching tier the vulnerability endpoints will serve.
    pub vuln_level: VulnLevel,
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
    pub log_format: String,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or(DATA_DIR_ENV, "./data"));
        let snapshot_dir = match std::env::var(SNAPSHOT_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => data_dir.join("snapshots"),
        };
        let audit_log_dir = match std::env::var(AUDIT_LOG_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => data_dir.join("audit"),
        };

        Self {
            host: env_or(HOST_ENV, "0.0.0.0"),
            port: parse_or(PORT_ENV, 8080),
            data_dir,
            snapshot_dir,
            audit_log_dir,
            session_ttl_minutes: parse_or(SESSION_TTL_ENV, 30),
            vuln_level: parse_or(VULN_LEVEL_ENV, VulnLevel::Basic),
            admin_username: env_or("ADMIN_USERNAME", "admin"),
            admin_email: env_or("ADMIN_EMAIL", "admin@vulnwallet.dev"),
            admin_password: env_or("ADMIN_PASSWORD", "admin123"),
            log_format: env_or(LOG_FORMAT_ENV, "pretty"),
        }
    }

    /// Path of the redb database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILENAME)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            snapshot_dir: PathBuf::from("./data/snapshots"),
            audit_log_dir: PathBuf::from("./data/audit"),
            session_ttl_minutes: 30,
            vuln_level: VulnLevel::Basic,
            admin_username: "admin".to_string(),
            admin_email: "admin@vulnwallet.dev".to_string(),
            admin_password: "admin123".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => match raw.parse() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%name, %raw, %err, "Unparseable environment value, using default");
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_consistent() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_minutes, 30);
        assert_eq!(config.vuln_level, VulnLevel::Basic);
        assert_eq!(config.db_path(), PathBuf::from("./data/vulnwallet.redb"));
    }

    #[test]
    fn vuln_level_parses_from_lowercase_names() {
        assert_eq!("basic".parse::<VulnLevel>().unwrap(), VulnLevel::Basic);
        assert_eq!("expert".parse::<VulnLevel>().unwrap(), VulnLevel::Expert);
        assert!("extreme".parse::<VulnLevel>().is_err());
    }
}
