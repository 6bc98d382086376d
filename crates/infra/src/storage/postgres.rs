//! Postgres-backed store.
//!
//! Uniqueness (`users.email`, `projects.name`, `roles.name`) and referential
//! integrity are enforced by the schema; see [`crate::error`] for how SQLx
//! errors map onto [`StoreError`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use teamgate_auth::{NewUser, Permission, RoleName, RoleRecord, UserPatch, UserRecord};
use teamgate_core::{AuditLogEntry, AuditLogId, NewAuditLogEntry, ProjectId, RoleId, UserId};
use teamgate_projects::{NewProject, ProjectPatch, ProjectRecord};

use super::{
    ActorSummary, AuditLogRepository, AuditLogView, ProjectRepository, RoleRepository,
    StoreResult, UserRepository,
};
use crate::error::{map_sqlx_error, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        permissions TEXT[] NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        username      TEXT NOT NULL,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role_id       UUID NOT NULL REFERENCES roles (id),
        deleted_at    TIMESTAMPTZ NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id            UUID PRIMARY KEY,
        name          TEXT NOT NULL UNIQUE,
        description   TEXT NOT NULL,
        created_by_id UUID NOT NULL REFERENCES users (id),
        deleted_at    TIMESTAMPTZ NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_assignees (
        project_id UUID NOT NULL REFERENCES projects (id),
        user_id    UUID NOT NULL REFERENCES users (id),
        PRIMARY KEY (project_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id              UUID PRIMARY KEY,
        action          TEXT NOT NULL,
        performed_by_id UUID NULL REFERENCES users (id),
        target_resource TEXT NOT NULL,
        timestamp       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS audit_logs_timestamp_idx ON audit_logs (timestamp, id)",
];

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role_id, deleted_at, created_at, updated_at";
const PROJECT_COLUMNS: &str =
    "id, name, description, created_by_id, deleted_at, created_at, updated_at";

/// Postgres-backed implementation of every repository.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Drain and close the pool. Later calls fail with a backend error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn begin(&self, operation: &str) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Attach assignee sets to freshly loaded project rows, preserving order.
    async fn with_assignees(&self, rows: Vec<PgRow>) -> StoreResult<Vec<ProjectRecord>> {
        let mut projects = rows
            .iter()
            .map(project_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        if projects.is_empty() {
            return Ok(projects);
        }

        let ids: Vec<Uuid> = projects.iter().map(|p| *p.id.as_uuid()).collect();
        let links = sqlx::query(
            "SELECT project_id, user_id FROM project_assignees WHERE project_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_assignees", e))?;

        let mut by_project: HashMap<Uuid, BTreeSet<UserId>> = HashMap::new();
        for link in links {
            let project_id: Uuid = link.try_get("project_id").map_err(decode_error)?;
            let user_id: Uuid = link.try_get("user_id").map_err(decode_error)?;
            by_project
                .entry(project_id)
                .or_default()
                .insert(UserId::from_uuid(user_id));
        }
        for project in &mut projects {
            if let Some(assignees) = by_project.remove(project.id.as_uuid()) {
                project.assigned_to = assignees;
            }
        }
        Ok(projects)
    }

    async fn load_project(&self, id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_project", e))?;
        Ok(self
            .with_assignees(row.into_iter().collect())
            .await?
            .pop())
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn role_from_row(row: &PgRow) -> StoreResult<RoleRecord> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let permissions: Vec<String> = row.try_get("permissions").map_err(decode_error)?;
    Ok(RoleRecord {
        id: RoleId::from_uuid(id),
        name: name
            .parse::<RoleName>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        permissions: permissions.into_iter().map(Permission::new).collect(),
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<UserRecord> {
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get("id").map_err(decode_error)?),
        username: row.try_get("username").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        password_hash: row.try_get("password_hash").map_err(decode_error)?,
        role_id: RoleId::from_uuid(row.try_get("role_id").map_err(decode_error)?),
        deleted_at: row.try_get("deleted_at").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

fn project_from_row(row: &PgRow) -> StoreResult<ProjectRecord> {
    Ok(ProjectRecord {
        id: ProjectId::from_uuid(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        created_by_id: UserId::from_uuid(row.try_get("created_by_id").map_err(decode_error)?),
        assigned_to: BTreeSet::new(),
        deleted_at: row.try_get("deleted_at").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

async fn connect_assignees(
    tx: &mut Transaction<'static, Postgres>,
    project_id: ProjectId,
    users: &BTreeSet<UserId>,
) -> StoreResult<()> {
    for user_id in users {
        sqlx::query(
            "INSERT INTO project_assignees (project_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(project_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("connect_assignee", e))?;
    }
    Ok(())
}

#[async_trait]
impl RoleRepository for PostgresStore {
    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        sqlx::query("SELECT id, name, permissions FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    async fn find_by_name(&self, name: RoleName) -> StoreResult<Option<RoleRecord>> {
        sqlx::query("SELECT id, name, permissions FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_name", e))?
            .as_ref()
            .map(role_from_row)
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn create_if_absent(&self, name: RoleName) -> StoreResult<RoleRecord> {
        let fresh = RoleRecord::new(name);
        let permissions: Vec<String> = fresh
            .permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();

        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            "INSERT INTO roles (id, name, permissions) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name, permissions",
        )
        .bind(fresh.id.as_uuid())
        .bind(name.as_str())
        .bind(&permissions)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_role", e))?;
        role_from_row(&row)
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn count_with_role(&self, role_id: RoleId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_excluding_role(&self, role_id: RoleId) -> StoreResult<Vec<UserRecord>> {
        sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role_id <> $1 ORDER BY created_at, id"
        ))
        .bind(role_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?
        .iter()
        .map(user_from_row)
        .collect()
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, username, email, password_hash, role_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(UserId::new().as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row)
    }

    #[instrument(skip(self, patch), err)]
    async fn update(&self, id: UserId, patch: UserPatch) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            "UPDATE users SET \
               username = COALESCE($2, username), \
               email = COALESCE($3, email), \
               password_hash = COALESCE($4, password_hash), \
               updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(patch.username)
        .bind(patch.email)
        .bind(patch.password_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user_from_row(&row)
    }

    async fn set_role(&self, id: UserId, role_id: RoleId) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role_id = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_role", e))?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user_from_row(&row)
    }

    async fn set_deleted_at(
        &self,
        id: UserId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            "UPDATE users SET deleted_at = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(deleted_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_user_deleted_at", e))?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user_from_row(&row)
    }
}

#[async_trait]
impl ProjectRepository for PostgresStore {
    async fn find_by_id(&self, id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        self.load_project(id).await
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<ProjectRecord>> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = $1"))
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_project_by_name", e))?;
        Ok(self.with_assignees(row.into_iter().collect()).await?.pop())
    }

    async fn list_all(&self) -> StoreResult<Vec<ProjectRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at, id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_projects", e))?;
        self.with_assignees(rows).await
    }

    async fn list_assigned_to(&self, user_id: UserId) -> StoreResult<Vec<ProjectRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE id IN (SELECT project_id FROM project_assignees WHERE user_id = $1) \
             ORDER BY created_at, id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_assigned_projects", e))?;
        self.with_assignees(rows).await
    }

    #[instrument(skip(self, project), fields(name = %project.name), err)]
    async fn insert(&self, project: NewProject) -> StoreResult<ProjectRecord> {
        let mut tx = self.begin("insert_project").await?;

        let row = sqlx::query(&format!(
            "INSERT INTO projects (id, name, description, created_by_id) \
             VALUES ($1, $2, $3, $4) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(ProjectId::new().as_uuid())
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.created_by_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_project", e))?;
        let mut record = project_from_row(&row)?;

        connect_assignees(&mut tx, record.id, &project.assigned_to).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_project", e))?;

        record.assigned_to = project.assigned_to;
        Ok(record)
    }

    #[instrument(skip(self, patch), err)]
    async fn update(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<ProjectRecord> {
        let mut tx = self.begin("update_project").await?;

        sqlx::query(
            "UPDATE projects SET \
               name = COALESCE($2, name), \
               description = COALESCE($3, description), \
               updated_at = now() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id.as_uuid())
        .bind(&patch.name)
        .bind(&patch.description)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_project", e))?
        .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;

        connect_assignees(&mut tx, id, &patch.assign).await?;
        if !patch.unassign.is_empty() {
            let unassign: Vec<Uuid> = patch.unassign.iter().map(|u| *u.as_uuid()).collect();
            sqlx::query(
                "DELETE FROM project_assignees WHERE project_id = $1 AND user_id = ANY($2)",
            )
            .bind(id.as_uuid())
            .bind(&unassign)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("disconnect_assignees", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_project", e))?;

        self.load_project(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    async fn set_deleted_at(
        &self,
        id: ProjectId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> StoreResult<ProjectRecord> {
        sqlx::query("UPDATE projects SET deleted_at = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(deleted_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_project_deleted_at", e))?;
        self.load_project(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }
}

#[async_trait]
impl AuditLogRepository for PostgresStore {
    #[instrument(skip(self, entry), fields(action = %entry.action), err)]
    async fn append(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
        let row = sqlx::query(
            "INSERT INTO audit_logs (id, action, performed_by_id, target_resource) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, action, performed_by_id, target_resource, timestamp",
        )
        .bind(AuditLogId::new().as_uuid())
        .bind(&entry.action)
        .bind(entry.performed_by.user_id().map(|id| *id.as_uuid()))
        .bind(&entry.target_resource)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit_log", e))?;
        audit_entry_from_row(&row)
    }

    async fn list_with_actors(&self) -> StoreResult<Vec<AuditLogView>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id, a.action, a.performed_by_id, a.target_resource, a.timestamp,
                u.username AS actor_username,
                u.email AS actor_email,
                u.role_id AS actor_role_id,
                u.deleted_at AS actor_deleted_at
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.performed_by_id
            ORDER BY a.timestamp ASC, a.id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit_logs", e))?;

        rows.iter()
            .map(|row| -> StoreResult<AuditLogView> {
                let entry = audit_entry_from_row(row)?;
                let username: Option<String> =
                    row.try_get("actor_username").map_err(decode_error)?;
                let performed_by = match (entry.performed_by_id, username) {
                    (Some(id), Some(username)) => {
                        let role_id: Uuid = row.try_get("actor_role_id").map_err(decode_error)?;
                        Some(ActorSummary {
                            id,
                            username,
                            email: row.try_get("actor_email").map_err(decode_error)?,
                            role_id: RoleId::from_uuid(role_id),
                            deleted_at: row.try_get("actor_deleted_at").map_err(decode_error)?,
                        })
                    }
                    _ => None,
                };
                Ok(AuditLogView {
                    entry,
                    performed_by,
                })
            })
            .collect()
    }
}

fn audit_entry_from_row(row: &PgRow) -> StoreResult<AuditLogEntry> {
    let performed_by_id: Option<Uuid> = row.try_get("performed_by_id").map_err(decode_error)?;
    Ok(AuditLogEntry {
        id: AuditLogId::from_uuid(row.try_get("id").map_err(decode_error)?),
        action: row.try_get("action").map_err(decode_error)?,
        performed_by_id: performed_by_id.map(UserId::from_uuid),
        target_resource: row.try_get("target_resource").map_err(decode_error)?,
        timestamp: row.try_get("timestamp").map_err(decode_error)?,
    })
}
