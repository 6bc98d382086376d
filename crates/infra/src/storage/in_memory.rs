use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use teamgate_auth::{NewUser, RoleName, RoleRecord, UserPatch, UserRecord};
use teamgate_core::{AuditLogEntry, AuditLogId, NewAuditLogEntry, ProjectId, RoleId, UserId};
use teamgate_projects::{NewProject, ProjectPatch, ProjectRecord};

use super::{
    ActorSummary, AuditLogRepository, AuditLogView, ProjectRepository, RoleRepository,
    StoreResult, UserRepository,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    roles: HashMap<RoleId, RoleRecord>,
    users: HashMap<UserId, UserRecord>,
    projects: HashMap<ProjectId, ProjectRecord>,
    audit_logs: Vec<AuditLogEntry>,
}

impl State {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn name_taken(&self, name: &str, except: Option<ProjectId>) -> bool {
        self.projects
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn ensure_users_exist<'a>(&self, ids: impl IntoIterator<Item = &'a UserId>) -> StoreResult<()> {
        for id in ids {
            if !self.users.contains_key(id) {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
        }
        Ok(())
    }

    fn user_mut(&mut self, id: UserId) -> StoreResult<&mut UserRecord> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    fn project_mut(&mut self, id: ProjectId) -> StoreResult<&mut ProjectRecord> {
        self.projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }
}

/// In-memory store for tests/dev, implementing every repository.
///
/// A single lock guards all tables so that uniqueness checks and the write
/// they protect are atomic with respect to other requests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
    }
}

fn sorted_by_creation<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (DateTime<Utc>, uuid::Uuid),
{
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn find_by_name(&self, name: RoleName) -> StoreResult<Option<RoleRecord>> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_if_absent(&self, name: RoleName) -> StoreResult<RoleRecord> {
        let mut state = self.write()?;
        if let Some(existing) = state.roles.values().find(|r| r.name == name) {
            return Ok(existing.clone());
        }
        let role = RoleRecord::new(name);
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn count_with_role(&self, role_id: RoleId) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(state.users.values().filter(|u| u.role_id == role_id).count() as u64)
    }

    async fn list_excluding_role(&self, role_id: RoleId) -> StoreResult<Vec<UserRecord>> {
        let users: Vec<UserRecord> = self
            .read()?
            .users
            .values()
            .filter(|u| u.role_id != role_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(users, |u| (u.created_at, *u.id.as_uuid())))
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        if state.email_taken(&user.email, None) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        if !state.roles.contains_key(&user.role_id) {
            return Err(StoreError::NotFound(format!("role {}", user.role_id)));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role_id: user.role_id,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        if let Some(email) = &patch.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
        }
        let user = state.user_mut(id)?;
        patch.apply(user, Utc::now());
        Ok(user.clone())
    }

    async fn set_role(&self, id: UserId, role_id: RoleId) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        let user = state.user_mut(id)?;
        user.role_id = role_id;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_deleted_at(
        &self,
        id: UserId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        let user = state.user_mut(id)?;
        user.deleted_at = deleted_at;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn find_by_id(&self, id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        Ok(self.read()?.projects.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ProjectRecord>> {
        Ok(self.read()?.projects.values().find(|p| p.name == name).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<ProjectRecord>> {
        let projects: Vec<ProjectRecord> = self.read()?.projects.values().cloned().collect();
        Ok(sorted_by_creation(projects, |p| (p.created_at, *p.id.as_uuid())))
    }

    async fn list_assigned_to(&self, user_id: UserId) -> StoreResult<Vec<ProjectRecord>> {
        let projects: Vec<ProjectRecord> = self
            .read()?
            .projects
            .values()
            .filter(|p| p.is_assigned_to(&user_id))
            .cloned()
            .collect();
        Ok(sorted_by_creation(projects, |p| (p.created_at, *p.id.as_uuid())))
    }

    async fn insert(&self, project: NewProject) -> StoreResult<ProjectRecord> {
        let mut state = self.write()?;
        if state.name_taken(&project.name, None) {
            return Err(StoreError::Conflict("projects_name_key".to_string()));
        }
        state.ensure_users_exist(
            std::iter::once(&project.created_by_id).chain(project.assigned_to.iter()),
        )?;

        let now = Utc::now();
        let record = ProjectRecord {
            id: ProjectId::new(),
            name: project.name,
            description: project.description,
            created_by_id: project.created_by_id,
            assigned_to: project.assigned_to,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<ProjectRecord> {
        let mut state = self.write()?;
        if let Some(name) = &patch.name {
            if state.name_taken(name, Some(id)) {
                return Err(StoreError::Conflict("projects_name_key".to_string()));
            }
        }
        state.ensure_users_exist(patch.assign.iter())?;
        let project = state.project_mut(id)?;
        patch.apply(project, Utc::now());
        Ok(project.clone())
    }

    async fn set_deleted_at(
        &self,
        id: ProjectId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<ProjectRecord> {
        let mut state = self.write()?;
        let project = state.project_mut(id)?;
        project.deleted_at = deleted_at;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn append(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
        let mut state = self.write()?;
        if let Some(actor) = entry.performed_by.user_id() {
            state.ensure_users_exist([&actor])?;
        }
        let stored = AuditLogEntry {
            id: AuditLogId::new(),
            action: entry.action,
            performed_by_id: entry.performed_by.user_id(),
            target_resource: entry.target_resource,
            timestamp: Utc::now(),
        };
        state.audit_logs.push(stored.clone());
        Ok(stored)
    }

    async fn list_with_actors(&self) -> StoreResult<Vec<AuditLogView>> {
        let state = self.read()?;
        let mut views: Vec<AuditLogView> = state
            .audit_logs
            .iter()
            .map(|entry| AuditLogView {
                performed_by: entry
                    .performed_by_id
                    .and_then(|id| state.users.get(&id))
                    .map(ActorSummary::from),
                entry: entry.clone(),
            })
            .collect();
        views.sort_by_key(|v| (v.entry.timestamp, *v.entry.id.as_uuid()));
        Ok(views)
    }
}
