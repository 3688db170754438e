// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NoSQL injection exercises.
//!
//! A document-style filter matcher runs over the user rows. What the
//! matcher honors grows with the tier, mirroring how much of an untrusted
//! filter document a real document store would interpret:
//!
//! - basic: username/password coerced to strings, equality only.
//! - medium: the raw request body IS the filter document; any field of
//!   the user document can be matched, equality only.
//! - hard: `$ne`, `$gt`, `$gte`, `$lt`, `$lte` honored inside field
//!   filters, so `{"password": {"$ne": ""}}` authenticates blind.
//! - expert: `$or` and `$and` honored at the top level, so
//!   `{"$or": [{"username": "x"}, {"is_admin": true}]}` exfiltrates the
//!   admin rows.
//!
//! Operators above the tier's capability are treated as literal values
//! and never match anything.

use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::models::User;

use super::VulnLevel;

// ===== Reports =====

/// One disclosed user document.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct NoSqlRow {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for NoSqlRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct NoSqlLoginReport {
    pub level: VulnLevel,
    /// The filter document as actually evaluated.
    #[schema(value_type = Object)]
    pub filter: Value,
    pub injection_detected: bool,
    pub authenticated: bool,
    pub results: Vec<NoSqlRow>,
}

// ===== Entry point =====

/// Evaluate a login request body as a filter document at the given tier.
pub fn login(level: VulnLevel, body: &Value, users: &[User]) -> NoSqlLoginReport {
    let filter = match level {
        VulnLevel::Basic => json!({
            "username": coerce_str(body.get("username")),
            "password": coerce_str(body.get("password")),
        }),
        // From medium up the attacker controls the whole document.
        _ => body.clone(),
    };

    let results: Vec<NoSqlRow> = users
        .iter()
        .filter(|user| matches_filter(level, &filter, &document(user)))
        .map(NoSqlRow::from)
        .collect();

    NoSqlLoginReport {
        level,
        injection_detected: contains_operator(body),
        authenticated: !results.is_empty(),
        results,
        filter,
    }
}

/// The user row as the matcher sees it. The `password` field holds the
/// stored hash, so a literal password equality never succeeds.
fn document(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "password": user.password_hash,
        "is_admin": user.is_admin,
        "is_active": user.is_active,
    })
}

fn coerce_str(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Whether any `$`-prefixed key appears anywhere in the body.
fn contains_operator(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, inner)| key.starts_with('$') || contains_operator(inner)),
        Value::Array(items) => items.iter().any(contains_operator),
        _ => false,
    }
}

// ===== Matcher =====

fn matches_filter(level: VulnLevel, filter: &Value, doc: &Value) -> bool {
    let Value::Object(map) = filter else {
        return false;
    };
    map.iter().all(|(key, expected)| match key.as_str() {
        "$or" if level >= VulnLevel::Expert => match expected {
            Value::Array(branches) => branches
                .iter()
                .any(|branch| matches_filter(level, branch, doc)),
            _ => false,
        },
        "$and" if level >= VulnLevel::Expert => match expected {
            Value::Array(branches) => branches
                .iter()
                .all(|branch| matches_filter(level, branch, doc)),
            _ => false,
        },
        _ => matches_field(level, doc.get(key), expected),
    })
}

fn matches_field(level: VulnLevel, actual: Option<&Value>, expected: &Value) -> bool {
    if let Value::Object(ops) = expected {
        if level >= VulnLevel::Hard && ops.keys().all(|k| k.starts_with('$')) {
            return ops
                .iter()
                .all(|(op, operand)| apply_operator(op, actual, operand));
        }
        // Below hard (or for a mixed object) the operator object is a
        // literal value, which no scalar field ever equals.
        return actual == Some(expected);
    }
    actual == Some(expected)
}

fn apply_operator(op: &str, actual: Option<&Value>, operand: &Value) -> bool {
    match op {
        "$ne" => actual != Some(operand),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let Some(actual) = actual else { return false };
            match ordering(actual, operand) {
                Some(order) => match op {
                    "$gt" => order.is_gt(),
                    "$gte" => order.is_ge(),
                    "$lt" => order.is_lt(),
                    _ => order.is_le(),
                },
                None => false,
            }
        }
        // Unknown operators never match.
        _ => false,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}
