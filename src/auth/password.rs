// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing.
//!
//! Production credentials use PBKDF2-HMAC-SHA256 with a per-user random
//! salt, stored as `pbkdf2$<iterations>$<salt_b64>$<hash_b64>`. The
//! iteration count is read back from the stored string, so rows hashed
//! under an older cost still verify.
//!
//! Rows seeded through the raw data surface may hold bare strings in the
//! hash column (the weak-credential exercises depend on this). Anything
//! that does not parse as the encoded form is compared verbatim, in
//! constant time.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use ring::{constant_time, pbkdf2};
use uuid::Uuid;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const PBKDF2_ITERATIONS: NonZeroU32 = NonZeroU32::new(100_000).unwrap();
const CREDENTIAL_LEN: usize = ring::digest::SHA256_OUTPUT_LEN;
const SALT_LEN: usize = 16;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = *Uuid::new_v4().as_bytes();
    let mut hash = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        PBKDF2_ALG,
        PBKDF2_ITERATIONS,
        &salt,
        password.as_bytes(),
        &mut hash,
    );
    format!(
        "pbkdf2${}${}${}",
        PBKDF2_ITERATIONS,
        Base64::encode_string(&salt),
        Base64::encode_string(&hash)
    )
}

/// Check a password against a stored hash column value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match parse_encoded(stored) {
        Some((iterations, salt, hash)) => {
            pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &hash).is_ok()
        }
        None => {
            constant_time::verify_slices_are_equal(password.as_bytes(), stored.as_bytes()).is_ok()
        }
    }
}

fn parse_encoded(stored: &str) -> Option<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != "pbkdf2" {
        return None;
    }
    let iterations = NonZeroU32::new(parts.next()?.parse().ok()?)?;
    let salt = Base64::decode_vec(parts.next()?).ok()?;
    let hash = Base64::decode_vec(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((iterations, salt, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let stored = hash_password("correct horse battery staple");
        assert!(stored.starts_with("pbkdf2$100000$"));
        assert!(verify_password("correct horse battery staple", &stored));
        assert!(!verify_password("wrong password", &stored));
    }

    #[test]
    fn each_hash_gets_a_fresh_salt() {
        let a = hash_password("same input");
        let b = hash_password("same input");
        assert_ne!(a, b);
        assert!(verify_password("same input", &a));
        assert!(verify_password("same input", &b));
    }

    #[test]
    fn verify_honors_encoded_iteration_count() {
        let salt = [7u8; SALT_LEN];
        let mut hash = [0u8; CREDENTIAL_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            NonZeroU32::new(1_000).unwrap(),
            &salt,
            b"old-cost",
            &mut hash,
        );
        let stored = format!(
            "pbkdf2$1000${}${}",
            Base64::encode_string(&salt),
            Base64::encode_string(&hash)
        );
        assert!(verify_password("old-cost", &stored));
        assert!(!verify_password("new-cost", &stored));
    }

    #[test]
    fn unencoded_rows_compare_verbatim() {
        assert!(verify_password("password", "password"));
        assert!(!verify_password("password", "hunter2"));

        // An MD5 digest in the column only matches its own literal text.
        let digest = "5f4dcc3b5aa765d61d8327deb882cf99";
        assert!(!verify_password("password", digest));
        assert!(verify_password(digest, digest));
    }

    #[test]
    fn malformed_encoded_strings_fall_back_without_matching() {
        assert!(!verify_password("anything", "pbkdf2$not-a-number$AAAA$AAAA"));
        assert!(!verify_password("anything", "pbkdf2$1000$!!!!$AAAA"));
        assert!(!verify_password("anything", "pbkdf2$1000$AAAA$AAAA$extra"));
    }
}
