use std::collections::BTreeSet;

use chrono::Utc;

use teamgate_auth::Principal;
use teamgate_core::{ProjectId, SoftDelete, UserId};
use teamgate_infra::StoreError;
use teamgate_projects::{NewProject, ProjectPatch, ProjectRecord};

use super::{AppServices, ServiceResult};
use crate::app::dto::{parse_user_ids, CreateProjectRequest, UpdateProjectRequest};
use crate::app::errors::ApiError;

const DUPLICATE_NAME: &str = "Project with this name already exists";

impl AppServices {
    pub async fn create_project(
        &self,
        actor: &Principal,
        req: CreateProjectRequest,
    ) -> ServiceResult<ProjectRecord> {
        let new = NewProject {
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            created_by_id: actor.user_id,
            assigned_to: parse_user_ids(&req.assigned_to)?,
        };
        new.validate()?;

        if self.storage.projects.find_by_name(&new.name).await?.is_some() {
            return Err(ApiError::conflict(DUPLICATE_NAME));
        }
        self.ensure_assignees_exist(&new.assigned_to).await?;

        let project = self
            .storage
            .projects
            .insert(new)
            .await
            .map_err(project_store_error)?;

        self.audit(
            "Project created",
            actor.user_id,
            format!("Project ID: {}, Name: {}", project.id, project.name),
        )
        .await;
        Ok(project)
    }

    /// ADMIN sees every project; everyone else only those assigned to them.
    pub async fn list_projects(&self, actor: &Principal) -> ServiceResult<Vec<ProjectRecord>> {
        if actor.is_admin() {
            let projects = self.storage.projects.list_all().await?;
            self.audit("Fetched all projects", actor.user_id, "N/A".to_string())
                .await;
            Ok(projects)
        } else {
            let projects = self.storage.projects.list_assigned_to(actor.user_id).await?;
            self.audit("Fetched assigned projects", actor.user_id, "N/A".to_string())
                .await;
            Ok(projects)
        }
    }

    /// Misses are audited too.
    pub async fn get_project(
        &self,
        actor: &Principal,
        id: ProjectId,
    ) -> ServiceResult<ProjectRecord> {
        let target = format!("Project ID: {id}");
        match self.storage.projects.find_by_id(id).await? {
            Some(project) => {
                self.audit("Fetched project by ID", actor.user_id, target).await;
                Ok(project)
            }
            None => {
                self.audit("Failed to fetch project by ID", actor.user_id, target)
                    .await;
                Err(ApiError::not_found("Project not found"))
            }
        }
    }

    pub async fn update_project(
        &self,
        actor: &Principal,
        id: ProjectId,
        req: UpdateProjectRequest,
    ) -> ServiceResult<ProjectRecord> {
        let patch = ProjectPatch {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description.map(|d| d.trim().to_string()),
            assign: parse_user_ids(&req.assigned_to)?,
            unassign: parse_user_ids(&req.unassigned_to)?,
        };
        patch.validate()?;

        self.existing_project(id).await?;
        if let Some(name) = &patch.name {
            if let Some(other) = self.storage.projects.find_by_name(name).await? {
                if other.id != id {
                    return Err(ApiError::conflict(DUPLICATE_NAME));
                }
            }
        }
        self.ensure_assignees_exist(&patch.assign).await?;

        let project = self
            .storage
            .projects
            .update(id, patch)
            .await
            .map_err(project_store_error)?;

        self.audit(
            "Project updated",
            actor.user_id,
            format!("Project ID: {id}, Name: {}", project.name),
        )
        .await;
        Ok(project)
    }

    pub async fn delete_project(
        &self,
        actor: &Principal,
        id: ProjectId,
    ) -> ServiceResult<ProjectRecord> {
        self.existing_project(id).await?.ensure_deletable()?;

        let project = self
            .storage
            .projects
            .set_deleted_at(id, Some(Utc::now()))
            .await
            .map_err(project_store_error)?;

        self.audit("Project deleted", actor.user_id, format!("Project ID: {id}"))
            .await;
        Ok(project)
    }

    pub async fn restore_project(
        &self,
        actor: &Principal,
        id: ProjectId,
    ) -> ServiceResult<ProjectRecord> {
        self.existing_project(id).await?.ensure_restorable()?;

        let project = self
            .storage
            .projects
            .set_deleted_at(id, None)
            .await
            .map_err(project_store_error)?;

        self.audit("Project restored", actor.user_id, format!("Project ID: {id}"))
            .await;
        Ok(project)
    }

    async fn existing_project(&self, id: ProjectId) -> ServiceResult<ProjectRecord> {
        self.storage
            .projects
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project not found"))
    }

    async fn ensure_assignees_exist(&self, ids: &BTreeSet<UserId>) -> ServiceResult<()> {
        for id in ids {
            if self.storage.users.find_by_id(*id).await?.is_none() {
                return Err(ApiError::not_found(format!("Assigned user {id} not found")));
            }
        }
        Ok(())
    }
}

fn project_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => ApiError::conflict(DUPLICATE_NAME),
        StoreError::NotFound(_) => ApiError::not_found("Project or assigned user not found"),
        other => other.into(),
    }
}
