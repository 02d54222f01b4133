//! Credential service
//!
//! Wraps bcrypt so plaintext and hashes never leak past this module's
//! signatures. Inputs longer than bcrypt's 72-byte limit are truncated
//! before hashing and before verification, so both sides agree.

use crate::error::{GatewayError, GatewayResult};

const BCRYPT_MAX_BYTES: usize = 72;

fn truncate(password: &str) -> &str {
    if password.len() <= BCRYPT_MAX_BYTES {
        return password;
    }
    let mut end = BCRYPT_MAX_BYTES;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password[..end]
}

/// Hash a plaintext password into an opaque credential.
pub fn hash(password: &str) -> GatewayResult<String> {
    bcrypt::hash(truncate(password), bcrypt::DEFAULT_COST)
        .map_err(|e| GatewayError::internal(format!("credential hashing failed: {e}")))
}

/// Verify a plaintext password against a stored credential.
///
/// Any bcrypt-level failure (malformed hash) counts as a mismatch.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(truncate(password), stored_hash).unwrap_or(false)
}
