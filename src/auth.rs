//! JWT authentication boundary
//!
//! The HTTP layer resolves a bearer token to a [`Principal`] before any
//! ledger call; a missing or invalid token short-circuits with
//! [`Error::Unauthorized`]. Ledger operations then take the principal's
//! user id and never return another user's records.

use crate::error::{Error, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by platform tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    /// Username for display
    pub name: String,
    /// Expiry (seconds since Unix epoch)
    pub exp: usize,
}

/// Authenticated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The caller's user id
    pub user_id: Uuid,
    /// The caller's username
    pub username: String,
}

impl Principal {
    /// Resolve an `Authorization` header value to a principal.
    ///
    /// Accepts `Bearer <token>` only; every failure mode (missing scheme,
    /// bad signature, expired token, non-UUID subject) maps to
    /// [`Error::Unauthorized`] without leaking token material.
    pub fn from_bearer(header: &str, secret: &str) -> Result<Self> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("invalid auth header format".to_string()))?;

        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::warn!("JWT validation failed: {:?}", err);
            Error::Unauthorized("invalid or expired token".to_string())
        })?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| Error::Unauthorized("malformed subject claim".to_string()))?;

        Ok(Principal {
            user_id,
            username: data.claims.name,
        })
    }
}

/// Issue a signed token for a user. Used by tests and provisioning tools;
/// production tokens come from the platform's auth service.
pub fn issue_token(
    user_id: Uuid,
    username: &str,
    secret: &str,
    ttl_secs: i64,
) -> Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        name: username.to_string(),
        exp: (Utc::now().timestamp() + ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| Error::Unauthorized(format!("token signing failed: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_bearer_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "rivka", SECRET, 3600).unwrap();

        let principal =
            Principal::from_bearer(&format!("Bearer {}", token), SECRET).unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.username, "rivka");
    }

    #[test]
    fn test_missing_bearer_scheme_rejected() {
        let token = issue_token(Uuid::new_v4(), "rivka", SECRET, 3600).unwrap();
        let err = Principal::from_bearer(&token, SECRET).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(Uuid::new_v4(), "rivka", SECRET, 3600).unwrap();
        let err =
            Principal::from_bearer(&format!("Bearer {}", token), "other-secret").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(Uuid::new_v4(), "rivka", SECRET, -3600).unwrap();
        let err = Principal::from_bearer(&format!("Bearer {}", token), SECRET).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
