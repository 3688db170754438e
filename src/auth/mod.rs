// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session-token authentication for the wallet API.
//!
//! ## Auth Flow
//!
//! 1. Client registers (or uses seeded demo credentials)
//! 2. `POST /v1/auth/login` verifies the password and mints an opaque
//!    UUID session token with a configured TTL
//! 3. Client sends `Authorization: Bearer <token>`
//! 4. The [`Auth`] extractor resolves the token to its user row and
//!    rejects expired sessions and deactivated accounts
//!
//! Expired session rows stay in the store until the admin-triggered
//! reaper purges them; they are inert either way.

pub mod error;
pub mod extractor;
pub mod password;
pub mod sessions;

pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use sessions::AuthenticatedUser;
