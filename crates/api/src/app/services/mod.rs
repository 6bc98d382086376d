//! Domain operations.
//!
//! Each mutating operation runs in the same order: precondition checks, the
//! persistence mutation, then one call to the Audit Log Writer. The audit
//! call is not part of the mutation; if it fails, the error is logged here
//! and the operation still returns its result.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use teamgate_auth::{RoleName, RoleRecord, TokenService, UserRecord};
use teamgate_core::{AuditActor, RoleId, UserId};
use teamgate_infra::{AuditLogView, AuditLogWriter, Storage};

use crate::app::dto::UserWithRole;
use crate::app::errors::ApiError;
use crate::authz::Gate;

mod auth;
mod projects;
mod users;

pub type ServiceResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    tokens: Arc<TokenService>,
    audit: AuditLogWriter,
}

impl AppServices {
    pub fn new(storage: Storage, tokens: Arc<TokenService>) -> Self {
        let audit = AuditLogWriter::new(&storage);
        Self {
            storage,
            tokens,
            audit,
        }
    }

    pub fn gate(&self) -> Gate {
        Gate::new(
            self.tokens.clone(),
            self.storage.roles.clone(),
            self.storage.users.clone(),
        )
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Record an audit entry after a committed mutation. A failure is
    /// logged and never changes the operation's own result.
    async fn audit(&self, action: &str, actor: impl Into<AuditActor>, target_resource: String) {
        if let Err(e) = self.audit.record(action, actor.into(), target_resource).await {
            error!(action, error = %e, "audit write failed; operation result kept");
        }
    }

    async fn role_by_name(&self, name: RoleName) -> ServiceResult<Option<RoleRecord>> {
        Ok(self.storage.roles.find_by_name(name).await?)
    }

    async fn existing_user(&self, id: UserId) -> ServiceResult<UserRecord> {
        self.storage
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    async fn join_role(&self, user: UserRecord) -> ServiceResult<UserWithRole> {
        let role = self.storage.roles.find_by_id(user.role_id).await?;
        Ok(UserWithRole { user, role })
    }

    async fn join_roles(&self, users: Vec<UserRecord>) -> ServiceResult<Vec<UserWithRole>> {
        let mut roles: HashMap<RoleId, Option<RoleRecord>> = HashMap::new();
        let mut joined = Vec::with_capacity(users.len());
        for user in users {
            let role = match roles.get(&user.role_id) {
                Some(role) => role.clone(),
                None => {
                    let role = self.storage.roles.find_by_id(user.role_id).await?;
                    roles.insert(user.role_id, role.clone());
                    role
                }
            };
            joined.push(UserWithRole { user, role });
        }
        Ok(joined)
    }

    /// Full audit trail with actors. Unfiltered and unpaginated.
    pub async fn audit_logs(&self) -> ServiceResult<Vec<AuditLogView>> {
        Ok(self.storage.audit_logs.list_with_actors().await?)
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices").finish_non_exhaustive()
    }
}

/// The Gate and domain operations share one storage capability.
pub fn build_services(storage: Storage, tokens: TokenService) -> Arc<AppServices> {
    Arc::new(AppServices::new(storage, Arc::new(tokens)))
}
