// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vulnerability Demonstration Modules
//!
//! Deliberately broken reimplementations of search, authentication,
//! parsing, and deserialization primitives, each at four escalating
//! tiers. The injections genuinely work against the real user rows;
//! anything that would touch the host (command execution, file reads,
//! network fetches) is simulated and reported, never performed.
//!
//! Every endpoint is gated by the configured maximum [`VulnLevel`]:
//! requesting a tier above it behaves as if the route did not exist.
//!
//! These modules are fixtures for security training. Nothing in here is
//! a bug to fix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod command;
pub mod deserialize;
pub mod nosql;
pub mod sql;
pub mod weak_auth;
pub mod xss;
pub mod xxe;

// ===== Vulnerability Levels =====

/// Severity tier of a vulnerability exercise.
///
/// The configured level enables its own tier and everything below it:
/// `medium` serves basic and medium, `expert` serves all four.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum VulnLevel {
    Basic,
    Medium,
    Hard,
    Expert,
}

pub const ALL_LEVELS: [VulnLevel; 4] = [
    VulnLevel::Basic,
    VulnLevel::Medium,
    VulnLevel::Hard,
    VulnLevel::Expert,
];

impl VulnLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            VulnLevel::Basic => "basic",
            VulnLevel::Medium => "medium",
            VulnLevel::Hard => "hard",
            VulnLevel::Expert => "expert",
        }
    }

    /// Whether an exercise at `tier` is served under this configured level.
    pub fn allows(self, tier: VulnLevel) -> bool {
        tier <= self
    }
}

impl fmt::Display for VulnLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown vulnerability level '{0}'")]
pub struct ParseVulnLevelError(String);

impl FromStr for VulnLevel {
    type Err = ParseVulnLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(VulnLevel::Basic),
            "medium" => Ok(VulnLevel::Medium),
            "hard" => Ok(VulnLevel::Hard),
            "expert" => Ok(VulnLevel::Expert),
            _ => Err(ParseVulnLevelError(s.to_string())),
        }
    }
}

// ===== Shared scanning helpers =====

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
///
/// Needles must be pure ASCII; every matched byte is then ASCII too, so
/// the returned offset and `offset + needle.len()` are valid char
/// boundaries for slicing.
pub(crate) fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.len() > h.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

// ===== Catalog =====

/// One tier of one vulnerability class.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TierSummary {
    pub level: VulnLevel,
    pub summary: String,
    /// Whether the configured level serves this tier.
    pub enabled: bool,
}

/// A vulnerability class and its four tiers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VulnClass {
    pub name: String,
    pub weakness: String,
    pub cwe: String,
    pub tiers: Vec<TierSummary>,
}

/// The full exercise catalog under the configured level.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogReport {
    pub vulnerability_level: VulnLevel,
    pub classes: Vec<VulnClass>,
}

fn class(name: &str, weakness: &str, cwe: &str, summaries: [&str; 4], enabled: VulnLevel) -> VulnClass {
    VulnClass {
        name: name.to_string(),
        weakness: weakness.to_string(),
        cwe: cwe.to_string(),
        tiers: ALL_LEVELS
            .iter()
            .zip(summaries)
            .map(|(&level, summary)| TierSummary {
                level,
                summary: summary.to_string(),
                enabled: enabled.allows(level),
            })
            .collect(),
    }
}

/// Describe every vulnerability class with the tiers the configured
/// level serves.
pub fn catalog(enabled: VulnLevel) -> CatalogReport {
    CatalogReport {
        vulnerability_level: enabled,
        classes: vec![
            class(
                "sql-injection",
                "Improper neutralization of SQL query elements",
                "CWE-89",
                [
                    "Direct string concatenation into the query",
                    "Quote doubling that comment sequences still bypass",
                    "LIKE pattern interpolation with a wallet join",
                    "Union-style admin row exfiltration",
                ],
                enabled,
            ),
            class(
                "nosql-injection",
                "Improper neutralization of document query operators",
                "CWE-943",
                [
                    "Equality filter from raw strings",
                    "Raw request body used as the filter document",
                    "$ne and $gt operators honored in field filters",
                    "$or and $and with is_admin honored",
                ],
                enabled,
            ),
            class(
                "command-injection",
                "Improper neutralization of shell metacharacters",
                "CWE-78",
                [
                    "Host interpolated directly into the command line",
                    "Strips ; & | but nothing else",
                    "Appends a second command with &&",
                    "Redirects output through a world-readable temp file",
                ],
                enabled,
            ),
            class(
                "xss",
                "Improper neutralization of page content",
                "CWE-79",
                [
                    "No output encoding at all",
                    "Strips the literal lowercase <script> pair only",
                    "Strips javascript: and onerror= only",
                    "Strips script blocks case-insensitively, nothing else",
                ],
                enabled,
            ),
            class(
                "xxe",
                "Improper restriction of XML external entity references",
                "CWE-611",
                [
                    "Internal entities and file: external entities resolve",
                    "Remote http entities resolve as well",
                    "Parameter entities expand inside the DTD subset",
                    "Injected declarations are re-scanned, enabling exfil chains",
                ],
                enabled,
            ),
            class(
                "insecure-deserialization",
                "Deserialization of untrusted data",
                "CWE-502",
                [
                    "Type-tagged command gadgets dispatch",
                    "Base64-wrapped payloads are decoded and re-dispatched",
                    "Gadget chains run in sequence",
                    "File-read and network gadgets dispatch",
                ],
                enabled,
            ),
            class(
                "weak-authentication",
                "Use of weak credential and session primitives",
                "CWE-287",
                [
                    "Plaintext password storage, predictable date tokens",
                    "MD5 password storage, three-digit random tokens",
                    "SHA-1 password storage, timestamp tokens",
                    "Base64 password storage, unsigned JSON tokens",
                ],
                enabled,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(VulnLevel::Basic < VulnLevel::Medium);
        assert!(VulnLevel::Medium < VulnLevel::Hard);
        assert!(VulnLevel::Hard < VulnLevel::Expert);
    }

    #[test]
    fn configured_level_gates_tiers() {
        assert!(VulnLevel::Basic.allows(VulnLevel::Basic));
        assert!(!VulnLevel::Basic.allows(VulnLevel::Medium));
        assert!(VulnLevel::Medium.allows(VulnLevel::Basic));
        assert!(!VulnLevel::Hard.allows(VulnLevel::Expert));
        for level in ALL_LEVELS {
            assert!(VulnLevel::Expert.allows(level));
        }
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("basic".parse::<VulnLevel>().unwrap(), VulnLevel::Basic);
        assert_eq!("EXPERT".parse::<VulnLevel>().unwrap(), VulnLevel::Expert);
        assert!("extreme".parse::<VulnLevel>().is_err());
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&VulnLevel::Medium).unwrap(),
            "\"medium\""
        );
        let parsed: VulnLevel = serde_json::from_str("\"hard\"").unwrap();
        assert_eq!(parsed, VulnLevel::Hard);
    }

    #[test]
    fn find_ci_ignores_ascii_case() {
        assert_eq!(find_ci("Hello <SCRIPT>", "<script"), Some(6));
        assert_eq!(find_ci("nothing here", "<script"), None);
        assert_eq!(find_ci("abc", ""), Some(0));
        assert!(contains_ci("JaVaScRiPt:alert(1)", "javascript:"));
    }

    #[test]
    fn catalog_marks_enabled_tiers() {
        let report = catalog(VulnLevel::Medium);
        assert_eq!(report.classes.len(), 7);
        for class in &report.classes {
            assert_eq!(class.tiers.len(), 4);
            assert!(class.tiers[0].enabled);
            assert!(class.tiers[1].enabled);
            assert!(!class.tiers[2].enabled);
            assert!(!class.tiers[3].enabled);
        }
    }
}
