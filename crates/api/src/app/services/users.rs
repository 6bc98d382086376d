use chrono::Utc;

use teamgate_auth::user::{validate_email, validate_password, validate_username};
use teamgate_auth::{hash_password, Principal, RoleName, UserPatch, UserRecord};
use teamgate_core::{SoftDelete, UserId};
use teamgate_infra::StoreError;

use super::{AppServices, ServiceResult};
use crate::app::dto::{CreateUserRequest, UpdateUserRequest, UserWithRole};
use crate::app::errors::ApiError;

impl AppServices {
    /// `POST /users`.
    pub async fn create_user(
        &self,
        actor: &Principal,
        req: CreateUserRequest,
    ) -> ServiceResult<UserWithRole> {
        let created = self.create_user_with_role(req).await?;
        self.audit(
            "User created",
            actor.user_id,
            format!(
                "User ID: {}, Username: {}",
                created.user.id, created.user.username
            ),
        )
        .await;
        Ok(created)
    }

    /// Every user whose role is not ADMIN, with the role joined in.
    pub async fn list_users(&self, actor: &Principal) -> ServiceResult<Vec<UserWithRole>> {
        let users = match self.role_by_name(RoleName::Admin).await? {
            Some(admin) => self.storage.users.list_excluding_role(admin.id).await?,
            // Roles are created together at signup; no roles means no users.
            None => Vec::new(),
        };
        let users = self.join_roles(users).await?;

        self.audit(
            "Users retrieved",
            actor.user_id,
            format!("Users count: {}", users.len()),
        )
        .await;
        Ok(users)
    }

    pub async fn get_user(&self, actor: &Principal, id: UserId) -> ServiceResult<UserWithRole> {
        let user = self.existing_user(id).await?;
        let user = self.join_role(user).await?;
        self.audit("User retrieved by ID", actor.user_id, format!("User ID: {id}"))
            .await;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &Principal,
        id: UserId,
        req: UpdateUserRequest,
    ) -> ServiceResult<UserRecord> {
        if req.username.is_none() && req.email.is_none() && req.password.is_none() {
            return Err(ApiError::validation(
                "At least one field must be provided for update.",
            ));
        }
        if let Some(username) = &req.username {
            validate_username(username)?;
        }
        if let Some(email) = &req.email {
            validate_email(email)?;
        }
        if let Some(password) = &req.password {
            validate_password(password)?;
        }

        self.existing_user(id).await?;

        let email = req.email.map(|e| e.trim().to_string());
        if let Some(email) = &email {
            if let Some(other) = self.storage.users.find_by_email(email).await? {
                if other.id != id {
                    return Err(ApiError::conflict("User with this email already exists"));
                }
            }
        }

        let patch = UserPatch {
            username: req.username.map(|u| u.trim().to_string()),
            email,
            password_hash: req.password.as_deref().map(hash_password).transpose()?,
        };
        let user = self
            .storage
            .users
            .update(id, patch)
            .await
            .map_err(user_store_error)?;

        self.audit("User updated", actor.user_id, format!("User ID: {id}"))
            .await;
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &Principal, id: UserId) -> ServiceResult<UserRecord> {
        let existing = self.existing_user(id).await?;
        existing.ensure_deletable()?;

        let user = self
            .storage
            .users
            .set_deleted_at(id, Some(Utc::now()))
            .await
            .map_err(user_store_error)?;

        self.audit("User deleted", actor.user_id, format!("User ID: {id}"))
            .await;
        Ok(user)
    }

    pub async fn restore_user(&self, actor: &Principal, id: UserId) -> ServiceResult<UserRecord> {
        let existing = self.existing_user(id).await?;
        existing.ensure_restorable()?;

        let user = self
            .storage
            .users
            .set_deleted_at(id, None)
            .await
            .map_err(user_store_error)?;

        self.audit("User restored", actor.user_id, format!("User ID: {id}"))
            .await;
        Ok(user)
    }

    /// Move the user onto the named role. Holding it already is a conflict.
    pub async fn assign_role(
        &self,
        actor: &Principal,
        id: UserId,
        role_name: &str,
    ) -> ServiceResult<UserRecord> {
        let role_name = role_name.trim();
        if role_name.is_empty() {
            return Err(ApiError::validation("Role name is required."));
        }

        let user = self.existing_user(id).await?;
        let role = match role_name.parse::<RoleName>() {
            Ok(name) => self.role_by_name(name).await?,
            Err(_) => None,
        }
        .ok_or_else(|| ApiError::not_found("Role not found"))?;

        if user.role_id == role.id {
            return Err(ApiError::conflict("User already has this role assigned"));
        }

        let updated = self
            .storage
            .users
            .set_role(id, role.id)
            .await
            .map_err(user_store_error)?;

        self.audit(
            "Role assigned to user",
            actor.user_id,
            format!("User ID: {id}, Role: {}", role.name),
        )
        .await;
        Ok(updated)
    }

    /// Reset the user to the default role. Never leaves a user without one.
    pub async fn revoke_role(&self, actor: &Principal, id: UserId) -> ServiceResult<UserRecord> {
        self.existing_user(id).await?;
        let default_role = self
            .role_by_name(RoleName::DEFAULT)
            .await?
            .ok_or_else(|| ApiError::not_found("Default role not found"))?;

        let updated = self
            .storage
            .users
            .set_role(id, default_role.id)
            .await
            .map_err(user_store_error)?;

        self.audit(
            "Role revoked from user and default role assigned",
            actor.user_id,
            format!("User ID: {id}, New Role: {}", default_role.name),
        )
        .await;
        Ok(updated)
    }
}

/// A user can disappear or change between the precondition check and the
/// write; map what the store reports back onto the user-facing messages.
fn user_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(_) => ApiError::not_found("User not found"),
        StoreError::Conflict(_) => ApiError::conflict("User with this email already exists"),
        other => other.into(),
    }
}
