//! Bearer token issuance and the authentication gate.
//!
//! Tokens are HS256 JWTs signed with a [`SigningSecret`] that is injected once
//! at startup. Besides the standard second-precision `iat`, every token
//! carries `iat_ms` so that the credential-rotation check compares
//! milliseconds to milliseconds.
//!
//! The [`AuthUser`] extractor is the only way a handler learns who is
//! calling. Any failure (missing header, bad signature, expired token,
//! unknown user, token issued before the last password change) is reported
//! to the client as the same generic `401`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use keystore_store::User;
use keystore_vault::is_token_valid;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::ApiError;
use crate::state::AppState;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime, in hours.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 7 * 24;

/// Errors raised while building or checking tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),

    #[error("token could not be encoded: {0}")]
    Encode(jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),

    #[error("token issue time out of range")]
    BadIssueTime,
}

// ═══════════════════════════════════════════════════════════════════════
//  SigningSecret
// ═══════════════════════════════════════════════════════════════════════

/// The HMAC key for bearer tokens. Wiped from memory on drop.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = Zeroizing::new(secret.into());
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Claims and TokenIssuer
// ═══════════════════════════════════════════════════════════════════════

/// JWT claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Issued at (milliseconds since epoch).
    pub iat_ms: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> Result<DateTime<Utc>, TokenError> {
        DateTime::from_timestamp_millis(self.iat_ms).ok_or(TokenError::BadIssueTime)
    }
}

/// Signs and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: SigningSecret,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: SigningSecret, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id`, stamped with `now`.
    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_owned(),
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(TokenError::Encode)
    }

    /// Check signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(TokenError::Rejected)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  AuthUser extractor
// ═══════════════════════════════════════════════════════════════════════

/// The authenticated caller.
///
/// ```ignore
/// async fn me(AuthUser(user): AuthUser) -> impl IntoResponse { ... }
/// ```
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            debug!("request without bearer token");
            return Err(ApiError::unauthorized());
        };

        let claims = state.tokens.verify(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            ApiError::unauthorized()
        })?;
        let issued_at = claims.issued_at().map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            ApiError::unauthorized()
        })?;

        let Some(user) = state.users.find_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "token for unknown user");
            return Err(ApiError::unauthorized());
        };

        if !is_token_valid(issued_at, &user) {
            warn!(user_id = %user.id, "token issued before credential change");
            return Err(ApiError::unauthorized());
        }

        Ok(AuthUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
