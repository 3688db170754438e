// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Weak authentication exercises: bad password storage, guessable
//! session tokens, JWTs signed with hardcoded secrets, and password
//! policies with obvious holes.
//!
//! Everything here is self-contained demonstration material. None of
//! these primitives are used by the real session layer in
//! [`crate::auth`].

use std::fmt::Write as _;

use base64ct::{Base64, Encoding};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use md5::Md5;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use utoipa::ToSchema;

use super::VulnLevel;

// ===== Password storage =====

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HashReport {
    pub level: VulnLevel,
    /// Storage scheme the tier uses.
    pub scheme: String,
    /// What would land in the credential store.
    pub stored_value: String,
    /// Whether the stored value yields the password back directly.
    pub reversible: bool,
    pub weakness: String,
}

/// Store a password the way the tier would.
pub fn hash_report(level: VulnLevel, password: &str) -> HashReport {
    let (scheme, stored_value, reversible, weakness) = match level {
        VulnLevel::Basic => (
            "plaintext",
            password.to_string(),
            true,
            "any read of the store discloses every password".to_string(),
        ),
        VulnLevel::Medium => (
            "md5",
            hex_digest(&Md5::digest(password.as_bytes())),
            false,
            "unsalted MD5 falls to rainbow tables in seconds".to_string(),
        ),
        VulnLevel::Hard => (
            "sha1",
            hex_digest(&Sha1::digest(password.as_bytes())),
            false,
            "unsalted SHA-1 is brute-forceable on commodity GPUs".to_string(),
        ),
        VulnLevel::Expert => (
            "base64",
            Base64::encode_string(password.as_bytes()),
            true,
            "base64 is an encoding, not a hash".to_string(),
        ),
    };
    HashReport {
        level,
        scheme: scheme.to_string(),
        stored_value,
        reversible,
        weakness,
    }
}

// ===== Session tokens and JWTs =====

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenReport {
    pub level: VulnLevel,
    /// Session identifier scheme the tier uses.
    pub session_scheme: String,
    pub session_token: String,
    /// A JWT signed with the tier's hardcoded secret.
    pub jwt: String,
    /// The secret, disclosed so the exercise can be completed offline.
    pub jwt_secret: String,
    /// Human description of the expiry policy.
    pub expiry_policy: String,
    pub weakness: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeakClaims {
    pub sub: String,
    pub name: String,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// The per-tier hardcoded signing secrets. All four are crackable with
/// a dictionary; that is the exercise.
pub fn jwt_secret(level: VulnLevel) -> &'static str {
    match level {
        VulnLevel::Basic => "secret123",
        VulnLevel::Medium => "jwt_secret_key_2024",
        VulnLevel::Hard => "abc123",
        VulnLevel::Expert => "public_key_for_rsa",
    }
}

/// Mint the tier's session token and JWT for a user.
pub fn token_report(
    level: VulnLevel,
    user_id: u64,
    username: &str,
) -> Result<TokenReport, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let (session_scheme, session_token, weakness) = match level {
        VulnLevel::Basic => (
            "date-stamped",
            format!("session_{user_id}_{}", now.format("%Y%m%d")),
            "token is the user id plus today's date".to_string(),
        ),
        VulnLevel::Medium => (
            "three-digit-random",
            format!("s{user_id}{}", small_random()),
            "900 possible suffixes per user".to_string(),
        ),
        VulnLevel::Hard => (
            "timestamped",
            format!("{user_id}_{}", now.timestamp()),
            "token derives from the login second".to_string(),
        ),
        VulnLevel::Expert => {
            let payload = serde_json::json!({
                "user_id": user_id,
                "timestamp": now.to_rfc3339(),
            });
            (
                "unsigned-json",
                Base64::encode_string(payload.to_string().as_bytes()),
                "payload is unsigned, so user_id can be rewritten".to_string(),
            )
        }
    };

    let (expiry_policy, exp) = match level {
        VulnLevel::Basic => ("no expiration".to_string(), None),
        VulnLevel::Medium => (
            "expires after 365 days".to_string(),
            Some(now + Duration::days(365)),
        ),
        VulnLevel::Hard => (
            "expires after 24 hours".to_string(),
            Some(now + Duration::hours(24)),
        ),
        VulnLevel::Expert => (
            "expires after 30 minutes".to_string(),
            Some(now + Duration::minutes(30)),
        ),
    };

    let claims = WeakClaims {
        sub: user_id.to_string(),
        name: username.to_string(),
        iat: now.timestamp(),
        exp: exp.map(|t| t.timestamp()),
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret(level).as_bytes()),
    )?;

    Ok(TokenReport {
        level,
        session_scheme: session_scheme.to_string(),
        session_token,
        jwt,
        jwt_secret: jwt_secret(level).to_string(),
        expiry_policy,
        weakness,
    })
}

/// Dictionary attack against a token minted by [`token_report`].
/// Returns the secret that verifies the signature, if any candidate does.
pub fn crack_jwt(token: &str) -> Option<&'static str> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    const WORDLIST: [&str; 8] = [
        "password",
        "123456",
        "secret",
        "secret123",
        "jwt_secret_key_2024",
        "abc123",
        "public_key_for_rsa",
        "letmein",
    ];
    WORDLIST.into_iter().find(|candidate| {
        decode::<WeakClaims>(
            token,
            &DecodingKey::from_secret(candidate.as_bytes()),
            &validation,
        )
        .is_ok()
    })
}

// ===== Password policy =====

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PolicyReport {
    pub level: VulnLevel,
    pub accepted: bool,
    /// The rule the tier enforces.
    pub rule: String,
    pub weakness: String,
}

/// Validate a candidate password against the tier's policy.
pub fn password_policy(level: VulnLevel, password: &str) -> PolicyReport {
    const COMMON: [&str; 5] = ["password", "123456", "admin", "qwerty", "letmein"];

    let (accepted, rule, weakness) = match level {
        VulnLevel::Basic => (
            !password.is_empty(),
            "any non-empty password",
            "a single character passes",
        ),
        VulnLevel::Medium => (
            password.len() >= 4,
            "at least 4 characters",
            "4-character passwords fall to online brute force",
        ),
        VulnLevel::Hard => (
            password.len() >= 6 && !COMMON.contains(&password),
            "at least 6 characters, not in a 5-word denylist",
            "'password1' passes the denylist",
        ),
        VulnLevel::Expert => {
            let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
            let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            let has_special = password.chars().any(|c| "!@#$%^&*".contains(c));
            (
                password.len() >= 8 && has_upper && has_lower && has_digit && has_special,
                "8+ characters with upper, lower, digit and special",
                "'Password1!' satisfies every check",
            )
        }
    };
    PolicyReport {
        level,
        accepted,
        rule: rule.to_string(),
        weakness: weakness.to_string(),
    }
}

// ===== Helpers =====

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// A suffix in 100..=999, which is the point.
fn small_random() -> u16 {
    let mut bytes = [0u8; 2];
    if SystemRandom::new().fill(&mut bytes).is_err() {
        return 100;
    }
    100 + u16::from_be_bytes(bytes) % 900
}
