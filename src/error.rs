// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types for the wallet service and its API surface.
//!
//! [`ServiceError`] is the taxonomy returned by the storage and snapshot
//! layers. [`ApiError`] is the HTTP-facing shape; `From<ServiceError>` maps
//! one onto the other so handlers can use `?` throughout.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::storage::StoreError;

// =============================================================================
// Service errors
// =============================================================================

/// Errors produced by wallet, snapshot, and support operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The request was well-formed but violates a domain rule.
    #[error("{0}")]
    Validation(String),

    /// A debit would overdraw the source wallet.
    #[error("Insufficient funds")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    /// The storage layer failed. Never surfaced verbatim to callers.
    #[error("storage failure: {0}")]
    Persistence(#[from] StoreError),
}

impl ServiceError {
    /// Not-found error for the named entity, e.g. `not_found("Wallet")`.
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(entity.to_string())
    }

    /// Validation failure with a caller-visible message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Lets `?` lift raw redb and serde failures straight into
/// [`ServiceError::Persistence`] inside storage code.
macro_rules! persistence_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for ServiceError {
                fn from(err: $source) -> Self {
                    ServiceError::Persistence(StoreError::from(err))
                }
            }
        )+
    };
}

persistence_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
    std::io::Error,
);

// =============================================================================
// API errors
// =============================================================================

/// API error with an HTTP status code and a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            ServiceError::Validation(_) => ApiError::bad_request(err.to_string()),
            ServiceError::InsufficientFunds { balance, requested } => {
                tracing::debug!(%balance, %requested, "Debit rejected for insufficient funds");
                ApiError::bad_request(err.to_string())
            }
            ServiceError::Persistence(source) => {
                // The storage detail goes to the log, never to the caller.
                tracing::error!(error = %source, "Storage operation failed");
                ApiError::internal("Internal storage error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let forbidden = ApiError::forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let internal = ApiError::internal("boom");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn not_found_display_names_the_entity() {
        let err = ServiceError::not_found("Wallet");
        assert_eq!(err.to_string(), "Wallet not found");
    }

    #[test]
    fn insufficient_funds_maps_to_bad_request() {
        let err = ServiceError::InsufficientFunds {
            balance: dec!(10.00),
            requested: dec!(25.00),
        };
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "Insufficient funds");
    }

    #[test]
    fn persistence_error_is_not_leaked() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let api: ApiError = ServiceError::from(source).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal storage error");
    }
}
