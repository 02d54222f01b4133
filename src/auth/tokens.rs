//! Token service
//!
//! JWT access/refresh token pairs (HS256). Access and refresh tokens are
//! signed with distinct secrets and carry a `type` claim so one can never
//! stand in for the other. Tokens are opaque to the rest of the gateway,
//! which only consumes `verify_access_token -> UserKey`.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GatewayError, GatewayResult};
use crate::keys::UserKey;

/// Access tokens live 30 minutes.
const ACCESS_TTL_SECS: u64 = 30 * 60;
/// Refresh tokens live 7 days.
const REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User key
    sub: String,
    /// Token class: "access" or "refresh"
    #[serde(rename = "type")]
    kind: String,
    /// Expiration (Unix seconds)
    exp: u64,
    /// Issued at (Unix seconds)
    iat: u64,
}

fn access_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set, using development default");
        "chatway-dev-secret-change-in-production".to_string()
    })
}

fn refresh_secret() -> String {
    std::env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_REFRESH_SECRET not set, using development default");
        "chatway-dev-refresh-secret-change-in-production".to_string()
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn issue(user: UserKey, kind: &str, ttl: u64, secret: &str) -> GatewayResult<String> {
    let now = now_secs();
    let claims = Claims {
        sub: user.to_string(),
        kind: kind.to_string(),
        exp: now + ttl,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| GatewayError::internal(format!("token issuance failed: {e}")))
}

fn verify(token: &str, kind: &str, secret: &str) -> GatewayResult<UserKey> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| GatewayError::auth("Invalid or expired token"))?;

    if data.claims.kind != kind {
        return Err(GatewayError::auth("Invalid or expired token"));
    }
    data.claims
        .sub
        .parse::<UserKey>()
        .map_err(|_| GatewayError::auth("Invalid or expired token"))
}

pub fn issue_access_token(user: UserKey) -> GatewayResult<String> {
    issue(user, "access", ACCESS_TTL_SECS, &access_secret())
}

pub fn verify_access_token(token: &str) -> GatewayResult<UserKey> {
    verify(token, "access", &access_secret())
}

pub fn issue_refresh_token(user: UserKey) -> GatewayResult<String> {
    issue(user, "refresh", REFRESH_TTL_SECS, &refresh_secret())
}

pub fn verify_refresh_token(token: &str) -> GatewayResult<UserKey> {
    verify(token, "refresh", &refresh_secret())
}
