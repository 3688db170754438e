// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SQL injection exercises.
//!
//! Queries are assembled by string concatenation, exactly the way the
//! vulnerable tiers advertise, and then run against the user table by a
//! small hand-rolled WHERE-clause evaluator. The evaluator is
//! quote-aware, understands `OR`/`AND`/`LIKE` and `--` comments, and is
//! deliberately no smarter than that: quote-breaking payloads really do
//! change the clause structure, which is the whole exercise.
//!
//! Tier ladder:
//! - basic: raw interpolation.
//! - medium: single quotes doubled first; comment and UNION text pass
//!   through untouched.
//! - hard: adds a wallet join and a `LIKE '%...%'` clause on email.
//! - expert: appends a union arm selecting every admin row.

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{User, Wallet};

use super::{contains_ci, find_ci, VulnLevel};

// ===== Reports =====

/// One disclosed row. Which fields are populated depends on the tier.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SqlRow {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "1000.00")]
    pub balance: Option<Decimal>,
}

impl From<&User> for SqlRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: Some(user.password_hash.clone()),
            is_admin: user.is_admin,
            balance: None,
        }
    }
}

impl SqlRow {
    fn without_hash(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SqlSearchReport {
    pub level: VulnLevel,
    /// The query as actually assembled, interpolated input included.
    pub query: String,
    pub injection_detected: bool,
    pub results: Vec<SqlRow>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SqlLoginReport {
    pub level: VulnLevel,
    pub query: String,
    pub injection_detected: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SqlRow>,
}

// ===== Entry points =====

/// Search users with the tier's assembled query.
pub fn search_users(
    level: VulnLevel,
    input: &str,
    users: &[User],
    wallets: &[Wallet],
) -> SqlSearchReport {
    let (query, clause) = match level {
        VulnLevel::Basic => (
            format!("SELECT * FROM users WHERE username = '{input}'"),
            format!("username = '{input}'"),
        ),
        VulnLevel::Medium => {
            let doubled = input.replace('\'', "''");
            (
                format!("SELECT * FROM users WHERE username = '{doubled}'"),
                format!("username = '{doubled}'"),
            )
        }
        VulnLevel::Hard => (
            format!(
                "SELECT u.*, w.balance FROM users u LEFT JOIN wallets w \
                 ON u.id = w.user_id WHERE u.username = '{input}' \
                 OR u.email LIKE '%{input}%'"
            ),
            format!("u.username = '{input}' OR u.email LIKE '%{input}%'"),
        ),
        VulnLevel::Expert => (
            format!(
                "SELECT id, username, email, password_hash, is_admin FROM users \
                 WHERE username = '{input}' UNION ALL \
                 SELECT id, username, email, password_hash, is_admin FROM users \
                 WHERE is_admin = 1"
            ),
            format!("username = '{input}'"),
        ),
    };

    let mut results = Vec::new();
    for user in users {
        if !eval_clause(&clause, user) {
            continue;
        }
        if level == VulnLevel::Hard {
            // Left join: one row per wallet, or a single null-balance row.
            let owned: Vec<&Wallet> = wallets.iter().filter(|w| w.user_id == user.id).collect();
            if owned.is_empty() {
                results.push(SqlRow::from(user));
            } else {
                for wallet in owned {
                    let mut row = SqlRow::from(user);
                    row.balance = Some(wallet.balance);
                    results.push(row);
                }
            }
        } else {
            results.push(SqlRow::from(user));
        }
    }
    if level == VulnLevel::Expert {
        // Union arm: every admin row, duplicates and all.
        results.extend(users.iter().filter(|u| u.is_admin).map(SqlRow::from));
    }

    SqlSearchReport {
        level,
        query,
        injection_detected: looks_injected(input),
        results,
    }
}

/// Attempt a login with the tier's assembled query.
///
/// The `password` column holds the stored hash, so a legitimate password
/// never satisfies the clause literally; only injection gets through.
pub fn login(level: VulnLevel, username: &str, password: &str, users: &[User]) -> SqlLoginReport {
    // Quote doubling applies from medium up. Comment sequences still
    // truncate the clause either way.
    let (u, p) = match level {
        VulnLevel::Basic => (username.to_string(), password.to_string()),
        _ => (username.replace('\'', "''"), password.replace('\'', "''")),
    };

    let mut clause = format!("username = '{u}' AND password = '{p}'");
    if level >= VulnLevel::Hard {
        clause.push_str(" AND is_active = 1");
    }
    let query = format!("SELECT * FROM users WHERE {clause}");

    let matched = users.iter().find(|user| eval_clause(&clause, user));
    let user = matched.map(|m| {
        let row = SqlRow::from(m);
        if level == VulnLevel::Expert {
            row
        } else {
            row.without_hash()
        }
    });

    SqlLoginReport {
        level,
        query,
        injection_detected: looks_injected(username) || looks_injected(password),
        authenticated: user.is_some(),
        user,
    }
}

fn looks_injected(input: &str) -> bool {
    input.contains('\'')
        || input.contains("--")
        || input.contains(';')
        || contains_ci(input, " or ")
        || contains_ci(input, "union")
}

// ===== Clause evaluator =====

#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Text(String),
    Number(f64),
    Null,
}

fn eval_clause(clause: &str, user: &User) -> bool {
    let clause = strip_comment(clause);
    split_keyword(clause, "or")
        .into_iter()
        .any(|term| split_keyword(term, "and").into_iter().all(|t| eval_term(t, user)))
}

fn eval_term(term: &str, user: &User) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }
    match split_comparison(term) {
        Some((lhs, op, rhs)) => {
            let left = resolve(lhs, user);
            let right = resolve(rhs, user);
            compare(&left, op, &right)
        }
        None => truthy(&resolve(term, user)),
    }
}

/// SQL line comment: everything from an unquoted `--` onward is dropped.
fn strip_comment(clause: &str) -> &str {
    let bytes = clause.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'-' if !in_quote && bytes.get(i + 1) == Some(&b'-') => return &clause[..i],
            _ => {}
        }
        i += 1;
    }
    clause
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split on an unquoted, word-bounded keyword, case-insensitively.
fn split_keyword<'a>(clause: &'a str, keyword: &str) -> Vec<&'a str> {
    let bytes = clause.as_bytes();
    let kw = keyword.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quote = !in_quote;
            i += 1;
            continue;
        }
        let end = i + kw.len();
        if !in_quote
            && end <= bytes.len()
            && bytes[i..end].eq_ignore_ascii_case(kw)
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && (end == bytes.len() || !is_word_byte(bytes[end]))
        {
            parts.push(&clause[start..i]);
            i = end;
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(&clause[start..]);
    parts
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

/// Find the first unquoted comparison operator.
fn split_comparison(term: &str) -> Option<(&str, Op, &str)> {
    let bytes = term.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quote = !in_quote;
            i += 1;
            continue;
        }
        if in_quote {
            i += 1;
            continue;
        }
        let end = i + 4;
        if end <= bytes.len()
            && bytes[i..end].eq_ignore_ascii_case(b"like")
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && (end == bytes.len() || !is_word_byte(bytes[end]))
        {
            return Some((&term[..i], Op::Like, &term[end..]));
        }
        if let Some(window) = bytes.get(i..i + 2) {
            let two = match window {
                b"!=" | b"<>" => Some(Op::Ne),
                b">=" => Some(Op::Ge),
                b"<=" => Some(Op::Le),
                _ => None,
            };
            if let Some(op) = two {
                return Some((&term[..i], op, &term[i + 2..]));
            }
        }
        let one = match bytes[i] {
            b'=' => Some(Op::Eq),
            b'>' => Some(Op::Gt),
            b'<' => Some(Op::Lt),
            _ => None,
        };
        if let Some(op) = one {
            return Some((&term[..i], op, &term[i + 1..]));
        }
        i += 1;
    }
    None
}

/// Resolve one side of a comparison: quoted literal, numeric literal,
/// or a column of the user row. Unknown names resolve to NULL.
fn resolve(token: &str, user: &User) -> SqlValue {
    let token = token.trim();
    let token = token
        .strip_prefix("u.")
        .or_else(|| token.strip_prefix("w."))
        .unwrap_or(token);

    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return SqlValue::Text(token[1..token.len() - 1].replace("''", "'"));
    }
    if let Ok(n) = token.parse::<f64>() {
        return SqlValue::Number(n);
    }
    match token.to_ascii_lowercase().as_str() {
        "username" => SqlValue::Text(user.username.clone()),
        "email" => SqlValue::Text(user.email.clone()),
        "password" | "password_hash" => SqlValue::Text(user.password_hash.clone()),
        "id" => SqlValue::Number(user.id as f64),
        "is_admin" => SqlValue::Number(u8::from(user.is_admin) as f64),
        "is_active" => SqlValue::Number(u8::from(user.is_active) as f64),
        _ => SqlValue::Null,
    }
}

fn as_number(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Number(n) => Some(*n),
        SqlValue::Text(t) => t.trim().parse().ok(),
        SqlValue::Null => None,
    }
}

fn truthy(value: &SqlValue) -> bool {
    matches!(as_number(value), Some(n) if n != 0.0)
}

fn values_equal(left: &SqlValue, right: &SqlValue) -> bool {
    match (left, right) {
        (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
        (SqlValue::Null, _) | (_, SqlValue::Null) => false,
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(left: &SqlValue, op: Op, right: &SqlValue) -> bool {
    match op {
        Op::Eq => values_equal(left, right),
        Op::Ne => {
            !matches!(left, SqlValue::Null)
                && !matches!(right, SqlValue::Null)
                && !values_equal(left, right)
        }
        Op::Like => match (left, right) {
            (SqlValue::Text(text), SqlValue::Text(pattern)) => like_match(text, pattern),
            _ => false,
        },
        Op::Gt | Op::Ge | Op::Lt | Op::Le => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => match op {
                Op::Gt => a > b,
                Op::Ge => a >= b,
                Op::Lt => a < b,
                Op::Le => a <= b,
                _ => false,
            },
            _ => false,
        },
    }
}

/// Case-insensitive LIKE with `%` wildcards.
fn like_match(text: &str, pattern: &str) -> bool {
    let text = text.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    let segments: Vec<&str> = pattern.split('%').collect();
    if segments.len() == 1 {
        return text == pattern;
    }

    let first = segments[0];
    if !text.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for seg in &segments[1..segments.len() - 1] {
        if seg.is_empty() {
            continue;
        }
        match text[pos..].find(seg) {
            Some(found) => pos += found + seg.len(),
            None => return false,
        }
    }

    let last = segments[segments.len() - 1];
    if last.is_empty() {
        return true;
    }
    text.len() >= pos + last.len() && text.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn user(id: u64, username: &str, email: &str, is_admin: bool, is_active: bool) -> User {
        let now = Utc::now();
        User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: format!("pbkdf2$100000$salt{id}$hash{id}"),
            is_admin,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_users() -> Vec<User> {
        vec![
            user(1, "admin", "admin@vulnwallet.dev", true, true),
            user(2, "john", "john@example.com", false, true),
            user(3, "jane", "jane@example.com", false, false),
        ]
    }

    fn wallet(id: u64, user_id: u64, balance: Decimal) -> Wallet {
        let now = Utc::now();
        Wallet {
            id,
            user_id,
            wallet_name: "Main".to_string(),
            balance,
            currency: "USD".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn basic_exact_match_returns_one_row() {
        let users = sample_users();
        let report = search_users(VulnLevel::Basic, "john", &users, &[]);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].username, "john");
        assert!(!report.injection_detected);
    }

    #[test]
    fn basic_quote_break_matches_every_row() {
        let users = sample_users();
        let report = search_users(VulnLevel::Basic, "' OR '1'='1", &users, &[]);
        assert_eq!(report.results.len(), 3);
        assert!(report.injection_detected);
        assert!(report.query.contains("username = '' OR '1'='1'"));
    }

    #[test]
    fn medium_quote_doubling_blocks_the_quote_break() {
        let users = sample_users();
        let report = search_users(VulnLevel::Medium, "' OR '1'='1", &users, &[]);
        assert!(report.results.is_empty());

        // Comment and union text pass through the sanitizer untouched.
        let report = search_users(VulnLevel::Medium, "x--UNION", &users, &[]);
        assert!(report.query.contains("x--UNION"));
        assert!(report.injection_detected);

        let exact = search_users(VulnLevel::Medium, "admin", &users, &[]);
        assert_eq!(exact.results.len(), 1);
    }

    #[test]
    fn hard_like_clause_matches_email_substrings() {
        let users = sample_users();
        let wallets = vec![wallet(1, 2, dec!(250.00))];
        let report = search_users(VulnLevel::Hard, "example", &users, &wallets);

        // john and jane via the LIKE arm; admin's email does not match.
        assert_eq!(report.results.len(), 2);
        let john = report.results.iter().find(|r| r.username == "john").unwrap();
        assert_eq!(john.balance, Some(dec!(250.00)));
        let jane = report.results.iter().find(|r| r.username == "jane").unwrap();
        assert_eq!(jane.balance, None);
    }

    #[test]
    fn hard_join_emits_one_row_per_wallet() {
        let users = sample_users();
        let wallets = vec![wallet(1, 2, dec!(10.00)), wallet(2, 2, dec!(20.00))];
        let report = search_users(VulnLevel::Hard, "john", &users, &wallets);
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn expert_union_arm_discloses_admin_rows() {
        let users = sample_users();
        let report = search_users(VulnLevel::Expert, "ghost", &users, &[]);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].username, "admin");
        assert!(report.results[0].password_hash.is_some());
    }

    #[test]
    fn login_comment_bypass_skips_the_password_check() {
        let users = sample_users();
        let report = login(VulnLevel::Basic, "admin'--", "anything", &users);
        assert!(report.authenticated);
        let row = report.user.unwrap();
        assert_eq!(row.username, "admin");
        assert!(row.password_hash.is_none());
    }

    #[test]
    fn login_or_true_bypass_matches_the_first_row() {
        let users = sample_users();
        let report = login(VulnLevel::Basic, "' OR '1'='1' --", "x", &users);
        assert!(report.authenticated);
        assert_eq!(report.user.unwrap().username, "admin");
        assert!(report.injection_detected);
    }

    #[test]
    fn login_with_a_real_password_never_matches_the_hash() {
        let users = sample_users();
        let report = login(VulnLevel::Basic, "john", "password123", &users);
        assert!(!report.authenticated);
        assert!(report.user.is_none());
    }

    #[test]
    fn medium_login_blocks_the_comment_bypass() {
        let users = sample_users();
        let report = login(VulnLevel::Medium, "admin'--", "anything", &users);
        assert!(!report.authenticated);
    }

    #[test]
    fn hard_login_is_active_guard_is_commented_out_too() {
        let users = sample_users();
        // jane is deactivated; the injected comment removes the guard.
        let report = login(VulnLevel::Hard, "jane'--", "x", &users);
        assert!(report.authenticated);
        assert!(report.query.ends_with("AND is_active = 1"));
    }

    #[test]
    fn expert_login_discloses_the_stored_hash() {
        let users = sample_users();
        let report = login(VulnLevel::Expert, "admin'--", "x", &users);
        assert!(report.user.unwrap().password_hash.is_some());
    }

    #[test]
    fn split_keyword_ignores_quoted_keywords() {
        let parts = split_keyword("username = 'a or b' OR email = 'x'", "or");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].trim(), "username = 'a or b'");
    }

    #[test]
    fn strip_comment_ignores_quoted_dashes() {
        assert_eq!(strip_comment("name = 'a--b'"), "name = 'a--b'");
        assert_eq!(strip_comment("name = 'a'--rest"), "name = 'a'");
    }

    #[test]
    fn like_match_handles_wildcards() {
        assert!(like_match("john@example.com", "%example%"));
        assert!(like_match("John", "jo%"));
        assert!(like_match("john", "%HN"));
        assert!(like_match("john", "john"));
        assert!(!like_match("john", "%xyz%"));
        assert!(!like_match("ab", "ab%b"));
    }
}
