use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session token claims (transport-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated username.
    pub sub: String,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    /// Claims for `username`, valid from `now` for `ttl`.
    pub fn for_user(username: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: username.into(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token has no subject")]
    MissingSubject,
}

/// Deterministically validate token claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::token`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.sub.trim().is_empty() {
        return Err(TokenValidationError::MissingSubject);
    }
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_inside_window_are_valid() {
        let now = Utc::now();
        let claims = JwtClaims::for_user("admin", now, Duration::minutes(5));
        assert_eq!(validate_claims(&claims, now + Duration::minutes(1)), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let claims = JwtClaims::for_user("admin", now, Duration::minutes(5));
        assert_eq!(
            validate_claims(&claims, claims.expires_at),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_tokens_are_not_yet_valid() {
        let now = Utc::now();
        let claims = JwtClaims::for_user("admin", now + Duration::minutes(1), Duration::minutes(5));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn blank_subject_is_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::for_user(" ", now, Duration::minutes(5));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::MissingSubject));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::for_user("admin", now, Duration::minutes(-5));
        assert_eq!(
            validate_claims(&claims, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
