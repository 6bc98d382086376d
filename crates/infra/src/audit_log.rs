//! Audit Log Writer.
//!
//! Invoked by domain operations after their main effect has been persisted.
//! It is never part of the business transaction: a failure here is returned
//! to the caller, which logs it and keeps its own result.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, warn};

use teamgate_core::{AuditActor, AuditLogEntry, NewAuditLogEntry, UserId};

use crate::error::StoreError;
use crate::storage::{AuditLogRepository, Storage, UserRepository};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditWriteError {
    #[error("audit log write failed: {0}")]
    Store(#[from] StoreError),
}

/// What happened to a `record` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Recorded(AuditLogEntry),
    /// The actor id did not resolve to a user; nothing was written.
    SkippedUnknownActor(UserId),
}

impl AuditOutcome {
    pub fn entry(&self) -> Option<&AuditLogEntry> {
        match self {
            AuditOutcome::Recorded(entry) => Some(entry),
            AuditOutcome::SkippedUnknownActor(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct AuditLogWriter {
    users: Arc<dyn UserRepository>,
    audit_logs: Arc<dyn AuditLogRepository>,
}

impl AuditLogWriter {
    pub fn new(storage: &Storage) -> Self {
        Self {
            users: storage.users.clone(),
            audit_logs: storage.audit_logs.clone(),
        }
    }

    /// Append one entry.
    ///
    /// A real actor must exist (soft-deleted users count); an unknown one is
    /// skipped and reported on the operational log only. The anonymous
    /// sentinel bypasses the check. Storage failures, including during the
    /// existence check, are returned.
    pub async fn record(
        &self,
        action: &str,
        performed_by: AuditActor,
        target_resource: impl Into<String>,
    ) -> Result<AuditOutcome, AuditWriteError> {
        if let AuditActor::User(actor) = performed_by {
            let found = self.users.find_by_id(actor).await.inspect_err(|e| {
                error!(action, %actor, error = %e, "audit actor lookup failed");
            })?;
            if found.is_none() {
                warn!(action, %actor, "audit actor not found; entry skipped");
                return Ok(AuditOutcome::SkippedUnknownActor(actor));
            }
        }

        let entry = self
            .audit_logs
            .append(NewAuditLogEntry::new(action, performed_by, target_resource))
            .await
            .inspect_err(|e| {
                error!(action, actor = %performed_by, error = %e, "audit log append failed");
            })?;
        Ok(AuditOutcome::Recorded(entry))
    }
}

impl core::fmt::Debug for AuditLogWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditLogWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use teamgate_auth::{NewUser, RoleName};

    use super::*;
    use crate::storage::in_memory::InMemoryStore;
    use crate::storage::{AuditLogView, RoleRepository, StoreResult};

    struct BrokenAuditLog;

    #[async_trait]
    impl AuditLogRepository for BrokenAuditLog {
        async fn append(&self, _entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
            Err(StoreError::backend("disk full"))
        }

        async fn list_with_actors(&self) -> StoreResult<Vec<AuditLogView>> {
            Ok(vec![])
        }
    }

    async fn storage_with_user() -> (Storage, Arc<InMemoryStore>, UserId) {
        let store = Arc::new(InMemoryStore::new());
        let role = store.create_if_absent(RoleName::Admin).await.unwrap();
        let user = UserRepository::insert(
            store.as_ref(),
            NewUser {
                username: "root".to_string(),
                email: "root@example.com".to_string(),
                password_hash: "hash".to_string(),
                role_id: role.id,
            },
        )
        .await
        .unwrap();
        (Storage::from_shared(store.clone()), store, user.id)
    }

    #[tokio::test]
    async fn records_entry_for_existing_actor() {
        let (storage, store, user_id) = storage_with_user().await;
        let writer = AuditLogWriter::new(&storage);

        let outcome = writer
            .record("User created", AuditActor::User(user_id), "User ID: 1, Username: bob")
            .await
            .unwrap();

        let entry = outcome.entry().unwrap();
        assert_eq!(entry.performed_by_id, Some(user_id));
        assert_eq!(entry.action, "User created");
        assert_eq!(store.list_with_actors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_actor_is_skipped_without_error() {
        let (storage, store, _) = storage_with_user().await;
        let writer = AuditLogWriter::new(&storage);
        let ghost = UserId::new();

        let outcome = writer
            .record("User updated", AuditActor::User(ghost), "User ID: x")
            .await
            .unwrap();

        assert_eq!(outcome, AuditOutcome::SkippedUnknownActor(ghost));
        assert!(store.list_with_actors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sentinel_actor_bypasses_existence_check() {
        let (storage, store, _) = storage_with_user().await;
        let writer = AuditLogWriter::new(&storage);

        let outcome = writer
            .record("Failed login attempt", AuditActor::Anonymous, "Email: ghost@example.com")
            .await
            .unwrap();

        assert_eq!(outcome.entry().unwrap().performed_by_id, None);
        assert_eq!(store.list_with_actors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let (storage, _, user_id) = storage_with_user().await;
        let storage = storage.with_audit_logs(Arc::new(BrokenAuditLog));
        let writer = AuditLogWriter::new(&storage);

        let err = writer
            .record("User deleted", AuditActor::User(user_id), "User ID: x")
            .await
            .unwrap_err();

        assert_eq!(err, AuditWriteError::Store(StoreError::backend("disk full")));
    }
}
