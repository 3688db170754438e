// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! VulnWallet - Deliberately Vulnerable Digital Wallet Service
//!
//! A small custodial wallet service that doubles as a security training
//! target: the `/v1/vuln` routes expose OWASP Top-10 style weaknesses at
//! four escalating tiers, gated by the `VULN_LEVEL` configuration.
//! Everything outside `vuln` is a conventional wallet API.
//!
//! Never deploy this outside an isolated lab network.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session authentication and password hashing
//! - `storage` - redb-backed ledger store and audit trail
//! - `snapshot` - Demo data seeding and JSON snapshots
//! - `vuln` - The vulnerability exercise fixtures

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod vuln;
