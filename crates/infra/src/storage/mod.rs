//! Storage-access capability.
//!
//! One async trait per aggregate, bundled into [`Storage`]. Handlers and the
//! Gate only ever see the trait objects, so tests can swap a single
//! repository (e.g. a failing audit log) without touching the rest.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use teamgate_auth::{NewUser, RoleName, RoleRecord, UserPatch, UserRecord};
use teamgate_core::{AuditLogEntry, NewAuditLogEntry, ProjectId, RoleId, UserId};
use teamgate_projects::{NewProject, ProjectPatch, ProjectRecord};

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>>;

    async fn find_by_name(&self, name: RoleName) -> StoreResult<Option<RoleRecord>>;

    /// Upsert with an empty update: returns the existing record untouched, or
    /// creates one with the role's default permissions.
    async fn create_if_absent(&self, name: RoleName) -> StoreResult<RoleRecord>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// Counts soft-deleted users too.
    async fn count_with_role(&self, role_id: RoleId) -> StoreResult<u64>;

    /// Ordered by creation time.
    async fn list_excluding_role(&self, role_id: RoleId) -> StoreResult<Vec<UserRecord>>;

    /// `Conflict` on a duplicate email.
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// `NotFound` if the user is absent, `Conflict` on a duplicate email.
    async fn update(&self, id: UserId, patch: UserPatch) -> StoreResult<UserRecord>;

    async fn set_role(&self, id: UserId, role_id: RoleId) -> StoreResult<UserRecord>;

    async fn set_deleted_at(
        &self,
        id: UserId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<UserRecord>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, id: ProjectId) -> StoreResult<Option<ProjectRecord>>;

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ProjectRecord>>;

    /// Ordered by creation time.
    async fn list_all(&self) -> StoreResult<Vec<ProjectRecord>>;

    async fn list_assigned_to(&self, user_id: UserId) -> StoreResult<Vec<ProjectRecord>>;

    /// `Conflict` on a duplicate name, `NotFound` on an unknown assignee.
    async fn insert(&self, project: NewProject) -> StoreResult<ProjectRecord>;

    /// Connects `patch.assign`, then disconnects `patch.unassign`.
    async fn update(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<ProjectRecord>;

    async fn set_deleted_at(
        &self,
        id: ProjectId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<ProjectRecord>;
}

/// Append-only: no update or delete.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry>;

    /// Every entry, ordered by timestamp then id, joined with its actor.
    async fn list_with_actors(&self) -> StoreResult<Vec<AuditLogView>>;
}

/// Password-free projection of the user who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSummary {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role_id: RoleId,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for ActorSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role_id: user.role_id,
            deleted_at: user.deleted_at,
        }
    }
}

/// An audit entry as returned by the read endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogView {
    #[serde(flatten)]
    pub entry: AuditLogEntry,
    /// `None` for the sentinel actor.
    pub performed_by: Option<ActorSummary>,
}

/// The injected storage-access capability.
#[derive(Clone)]
pub struct Storage {
    pub roles: Arc<dyn RoleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
}

impl Storage {
    /// All four repositories backed by one shared store.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: RoleRepository + UserRepository + ProjectRepository + AuditLogRepository + 'static,
    {
        Self {
            roles: store.clone(),
            users: store.clone(),
            projects: store.clone(),
            audit_logs: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_shared(Arc::new(in_memory::InMemoryStore::new()))
    }

    /// Replace the audit log repository, keeping everything else.
    pub fn with_audit_logs(mut self, audit_logs: Arc<dyn AuditLogRepository>) -> Self {
        self.audit_logs = audit_logs;
        self
    }
}

impl core::fmt::Debug for Storage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}
