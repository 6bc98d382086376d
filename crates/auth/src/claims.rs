use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use teamgate_core::{RoleId, UserId};

/// Bearer token claims.
///
/// The token carries the role *id*, never the role name: the Gate resolves the
/// name from storage on every request, so a role change applies to the very
/// next request instead of waiting for the token to expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: UserId,
    pub role_id: RoleId,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Could not be parsed, signature did not verify, or the claims are
    /// structurally inconsistent.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signature is valid but the expiry has elapsed.
    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Stable label for operational logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed_token",
            TokenError::Expired => "expired_token",
            TokenError::Signing(_) => "signing_failed",
        }
    }
}

/// Deterministically validate the time window of already-verified claims.
///
/// Signature verification happens in [`crate::token::TokenService`]; this only
/// checks the claims against `now`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::Malformed(
            "invalid time window (exp <= iat)".to_string(),
        ));
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenError::Malformed("issued in the future".to_string()));
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(iat: DateTime<Utc>, ttl: Duration) -> TokenClaims {
        TokenClaims {
            user_id: UserId::new(),
            role_id: RoleId::new(),
            iat: iat.timestamp(),
            exp: (iat + ttl).timestamp(),
        }
    }

    #[test]
    fn valid_inside_window() {
        let now = Utc::now();
        let c = claims(now, Duration::hours(24));
        assert_eq!(validate_claims(&c, now + Duration::hours(23)), Ok(()));
    }

    #[test]
    fn expired_at_boundary() {
        let now = Utc::now();
        let c = claims(now, Duration::hours(24));
        assert_eq!(
            validate_claims(&c, now + Duration::hours(24)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn future_issue_is_malformed() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(5), Duration::hours(24));
        assert!(matches!(validate_claims(&c, now), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn inverted_window_is_malformed() {
        let now = Utc::now();
        let mut c = claims(now, Duration::hours(1));
        c.exp = c.iat;
        assert!(matches!(validate_claims(&c, now), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn wire_names_are_camel_case() {
        let c = claims(Utc::now(), Duration::hours(1));
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("roleId").is_some());
    }
}
