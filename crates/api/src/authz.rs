//! Authorization Gate.
//!
//! Runs before every protected handler: extract the bearer token, verify it,
//! re-fetch the caller's current role from storage, and check the resolved
//! name against the route's required-role set. The role comes from the user
//! record as it is now, not from the token, so assigning or revoking a role
//! applies to the very next request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use teamgate_auth::{authorize, AuthzError, Principal, RoleName, TokenError, TokenService};
use teamgate_core::{RoleId, UserId};
use teamgate_infra::{RoleRepository, StoreError, UserRepository};

pub const ADMIN_ONLY: &[RoleName] = &[RoleName::Admin];
pub const ADMIN_OR_MANAGER: &[RoleName] = &[RoleName::Admin, RoleName::Manager];
pub const ANY_ROLE: &[RoleName] = &RoleName::ALL;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("no bearer credential supplied")]
    MissingCredential,

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    #[error("user {0} no longer exists")]
    UnknownUser(UserId),

    #[error("role {0} no longer exists")]
    UnknownRole(RoleId),

    #[error(transparent)]
    InsufficientRole(#[from] AuthzError),

    #[error("role lookup failed: {0}")]
    Storage(#[from] StoreError),
}

impl GateError {
    /// Stable label for operational logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::MissingCredential => "missing_credential",
            GateError::InvalidToken(e) => e.kind(),
            GateError::UnknownUser(_) => "unknown_user",
            GateError::UnknownRole(_) => "unknown_role",
            GateError::InsufficientRole(_) => "insufficient_role",
            GateError::Storage(_) => "storage_error",
        }
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// An absent or blank header is a missing credential (401); a header that is
/// present but not a bearer credential is treated as malformed (403).
pub fn extract_bearer(header: Option<&str>) -> Result<&str, GateError> {
    let header = header.map(str::trim).unwrap_or_default();
    // Proxies may trim "Bearer " down to the bare scheme.
    if header.is_empty() || header.eq_ignore_ascii_case("bearer") {
        return Err(GateError::MissingCredential);
    }

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| TokenError::Malformed("expected a bearer credential".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Malformed(format!("unsupported scheme '{scheme}'")).into());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(GateError::MissingCredential);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct Gate {
    tokens: Arc<TokenService>,
    roles: Arc<dyn RoleRepository>,
    users: Arc<dyn UserRepository>,
}

impl Gate {
    pub fn new(
        tokens: Arc<TokenService>,
        roles: Arc<dyn RoleRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            tokens,
            roles,
            users,
        }
    }

    pub async fn admit(
        &self,
        authorization: Option<&str>,
        required: &[RoleName],
    ) -> Result<Principal, GateError> {
        self.admit_at(authorization, required, Utc::now()).await
    }

    /// Single pass, no retries: extract -> verify -> resolve role -> authorize.
    ///
    /// The token's `roleId` is only what was true at issuance; the user's
    /// current `role_id` decides.
    pub async fn admit_at(
        &self,
        authorization: Option<&str>,
        required: &[RoleName],
        now: DateTime<Utc>,
    ) -> Result<Principal, GateError> {
        let token = extract_bearer(authorization)?;
        let claims = self.tokens.verify_at(token, now)?;

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(GateError::UnknownUser(claims.user_id))?;

        let role = self
            .roles
            .find_by_id(user.role_id)
            .await?
            .ok_or(GateError::UnknownRole(user.role_id))?;

        authorize(role.name, required)?;

        Ok(Principal {
            user_id: claims.user_id,
            role_id: role.id,
            role: role.name,
        })
    }
}

impl core::fmt::Debug for Gate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Gate")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use teamgate_auth::{NewUser, RoleRecord, UserRecord};
    use teamgate_infra::InMemoryStore;

    use super::*;

    async fn gate() -> (Gate, Arc<InMemoryStore>, Arc<TokenService>) {
        let store = Arc::new(InMemoryStore::new());
        let tokens = Arc::new(TokenService::new(b"gate-secret").unwrap());
        (
            Gate::new(tokens.clone(), store.clone(), store.clone()),
            store,
            tokens,
        )
    }

    async fn user_with(store: &InMemoryStore, role: &RoleRecord, name: &str) -> UserRecord {
        store
            .insert(NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "$argon2id$v=19$stub".to_string(),
                role_id: role.id,
            })
            .await
            .unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn extract_distinguishes_missing_from_malformed() {
        assert_eq!(extract_bearer(None), Err(GateError::MissingCredential));
        assert_eq!(extract_bearer(Some("   ")), Err(GateError::MissingCredential));
        assert_eq!(extract_bearer(Some("Bearer ")), Err(GateError::MissingCredential));
        assert_eq!(extract_bearer(Some("Bearer abc")), Ok("abc"));
        assert_eq!(extract_bearer(Some("bearer abc")), Ok("abc"));
        assert!(matches!(
            extract_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(GateError::InvalidToken(TokenError::Malformed(_)))
        ));
        assert!(matches!(
            extract_bearer(Some("abc")),
            Err(GateError::InvalidToken(TokenError::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn admits_member_with_role_from_storage() {
        let (gate, store, tokens) = gate().await;
        let manager = store.create_if_absent(RoleName::Manager).await.unwrap();
        let user = user_with(&store, &manager, "mia").await;
        let token = tokens.issue(user.id, manager.id).unwrap();

        let principal = gate
            .admit(Some(&bearer(&token)), ADMIN_OR_MANAGER)
            .await
            .unwrap();

        assert_eq!(principal.user_id, user.id);
        assert_eq!(principal.role, RoleName::Manager);
    }

    #[tokio::test]
    async fn current_role_wins_over_token_role() {
        let (gate, store, tokens) = gate().await;
        let manager = store.create_if_absent(RoleName::Manager).await.unwrap();
        let employee = store.create_if_absent(RoleName::Employee).await.unwrap();
        let user = user_with(&store, &manager, "mia").await;
        let token = tokens.issue(user.id, manager.id).unwrap();

        store.set_role(user.id, employee.id).await.unwrap();

        let err = gate
            .admit(Some(&bearer(&token)), ADMIN_OR_MANAGER)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "insufficient_role");

        let principal = gate.admit(Some(&bearer(&token)), ANY_ROLE).await.unwrap();
        assert_eq!(principal.role, RoleName::Employee);
        assert_eq!(principal.role_id, employee.id);
    }

    #[tokio::test]
    async fn rejects_insufficient_role() {
        let (gate, store, tokens) = gate().await;
        let employee = store.create_if_absent(RoleName::Employee).await.unwrap();
        let user = user_with(&store, &employee, "eve").await;
        let token = tokens.issue(user.id, employee.id).unwrap();

        let err = gate.admit(Some(&bearer(&token)), ADMIN_ONLY).await.unwrap_err();
        assert_eq!(err.reason(), "insufficient_role");
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let (gate, store, tokens) = gate().await;
        let admin = store.create_if_absent(RoleName::Admin).await.unwrap();
        let token = tokens.issue(UserId::new(), admin.id).unwrap();

        let err = gate.admit(Some(&bearer(&token)), ANY_ROLE).await.unwrap_err();
        assert!(matches!(err, GateError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn expired_and_malformed_are_distinguishable() {
        let (gate, store, tokens) = gate().await;
        let admin = store.create_if_absent(RoleName::Admin).await.unwrap();
        let user = user_with(&store, &admin, "root").await;
        let issued = Utc::now() - Duration::hours(48);
        let stale = tokens.issue_at(user.id, admin.id, issued).unwrap();

        let expired = gate.admit(Some(&bearer(&stale)), ANY_ROLE).await.unwrap_err();
        let malformed = gate.admit(Some("Bearer junk"), ANY_ROLE).await.unwrap_err();

        assert_eq!(expired.reason(), "expired_token");
        assert_eq!(malformed.reason(), "malformed_token");
    }
}
