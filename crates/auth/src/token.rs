//! HS256 bearer token issuance and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use teamgate_core::{RoleId, UserId};

use crate::claims::{validate_claims, TokenClaims, TokenError};

/// Default token lifetime: one day.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningKeyError {
    #[error("signing secret must not be empty")]
    Empty,
}

/// Issues and verifies bearer tokens with a process-wide secret.
///
/// The secret is loaded once at startup and is read-only afterwards; the
/// service is cheap to clone behind an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, SigningKeyError> {
        Self::with_ttl(secret, Duration::hours(DEFAULT_TOKEN_TTL_HOURS))
    }

    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Result<Self, SigningKeyError> {
        if secret.is_empty() {
            return Err(SigningKeyError::Empty);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: UserId, role_id: RoleId) -> Result<String, TokenError> {
        self.issue_at(user_id, role_id, Utc::now())
    }

    /// Sign a token whose expiry is exactly `ttl` after `now`.
    pub fn issue_at(
        &self,
        user_id: UserId,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = TokenClaims {
            user_id,
            role_id,
            iat,
            exp: iat + self.ttl.num_seconds(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify the signature, then the time window against `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        // Expiry is checked by `validate_claims` so that `now` is injectable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> TokenService {
        TokenService::new(b"test-secret").unwrap()
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(TokenService::new(b"").unwrap_err(), SigningKeyError::Empty);
    }

    #[test]
    fn issued_token_verifies_and_carries_ids() {
        let svc = service();
        let user_id = UserId::new();
        let role_id = RoleId::new();

        let token = svc.issue(user_id, role_id).unwrap();
        let claims = svc.verify(&token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role_id, role_id);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_expired_not_malformed() {
        let svc = service();
        let issued = Utc::now() - Duration::hours(25);
        let token = svc.issue_at(UserId::new(), RoleId::new(), issued).unwrap();

        assert_eq!(svc.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn foreign_signature_is_malformed() {
        let other = TokenService::new(b"another-secret").unwrap();
        let token = other.issue(UserId::new(), RoleId::new()).unwrap();

        let err = service().verify(&token).unwrap_err();
        assert_eq!(err.kind(), "malformed_token");
    }

    #[test]
    fn tampered_payload_is_malformed() {
        let svc = service();
        let token = svc.issue(UserId::new(), RoleId::new()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = svc.issue(UserId::new(), RoleId::new()).unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();

        let err = svc.verify(&parts.join(".")).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            service().verify("not.a.token"),
            Err(TokenError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn expiry_is_exactly_ttl_after_issue(offset in 0i64..1_000_000, hours in 1i64..72) {
            let svc = TokenService::with_ttl(b"prop-secret", Duration::hours(hours)).unwrap();
            let now = DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap();
            let token = svc.issue_at(UserId::new(), RoleId::new(), now).unwrap();
            let claims = svc.verify_at(&token, now).unwrap();

            prop_assert_eq!(claims.iat, now.timestamp());
            prop_assert_eq!(claims.exp, now.timestamp() + hours * 3600);
            prop_assert_eq!(
                svc.verify_at(&token, now + Duration::hours(hours)),
                Err(TokenError::Expired)
            );
        }
    }
}
