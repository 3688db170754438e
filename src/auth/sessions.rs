// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session issue and lookup.
//!
//! Logging in mints an opaque UUID bearer token whose row lives in the
//! sessions table with a fixed TTL. Lookup rejects expired rows whether
//! or not the admin reaper has purged them yet.

use chrono::{Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{Session, User};
use crate::storage::WalletStore;

use super::AuthError;

/// Authenticated user information resolved from a session token.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Numeric user id
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Mint a session for a user who already passed credential checks.
pub fn create_session(
    store: &WalletStore,
    user_id: u64,
    ttl_minutes: i64,
) -> Result<Session, ServiceError> {
    let now = Utc::now();
    let session = Session {
        token: Uuid::new_v4().to_string(),
        user_id,
        expires_at: now + Duration::minutes(ttl_minutes),
        created_at: now,
    };
    store.put_session(&session)?;
    Ok(session)
}

/// Resolve a bearer token to its user.
pub fn authenticate(store: &WalletStore, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let session = store
        .get_session(token)
        .map_err(|e| AuthError::StorageFailure(e.to_string()))?
        .ok_or(AuthError::InvalidToken)?;

    if session.is_expired(Utc::now()) {
        // Best-effort cleanup; the admin reaper handles the rest.
        let _ = store.delete_session(token);
        return Err(AuthError::SessionExpired);
    }

    let user = match store.get_user(session.user_id) {
        Ok(user) => user,
        Err(ServiceError::NotFound(_)) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(AuthError::StorageFailure(e.to_string())),
    };
    if !user.is_active {
        return Err(AuthError::UserDisabled);
    }

    Ok(AuthenticatedUser::from(&user))
}
