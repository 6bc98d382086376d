use teamgate_auth::user::{validate_email, validate_password, validate_username};
use teamgate_auth::{hash_password, verify_password, NewUser, Principal, RoleName, UserRecord};
use teamgate_core::AuditActor;
use teamgate_infra::{ensure_default_roles, StoreError};

use super::{AppServices, ServiceResult};
use crate::app::dto::{CreateUserRequest, LoginRequest, SignupRequest, TokenResponse, UserWithRole};
use crate::app::errors::ApiError;

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Invalid email or password".to_string())
}

impl AppServices {
    /// Bootstrap the first administrator. Creates the default roles if absent.
    pub async fn signup(&self, req: SignupRequest) -> ServiceResult<UserWithRole> {
        validate_username(&req.username)?;
        validate_email(&req.email)?;
        validate_password(&req.password)?;

        let roles = ensure_default_roles(self.storage.roles.as_ref()).await?;
        let admin = roles
            .into_iter()
            .find(|r| r.name == RoleName::Admin)
            .ok_or_else(|| ApiError::internal("ADMIN role missing after bootstrap"))?;

        if self.storage.users.count_with_role(admin.id).await? > 0 {
            return Err(ApiError::conflict("An admin already exists"));
        }

        let user = self
            .insert_user(NewUser {
                username: req.username.trim().to_string(),
                email: req.email.trim().to_string(),
                password_hash: hash_password(&req.password)?,
                role_id: admin.id,
            })
            .await?;

        self.audit("Admin signed up", user.id, format!("Username: {}", user.username))
            .await;

        Ok(UserWithRole {
            user,
            role: Some(admin),
        })
    }

    /// Exchange credentials for a bearer token carrying the user's current
    /// role id. Both failure modes are audited and look identical to the caller.
    pub async fn login(&self, req: LoginRequest) -> ServiceResult<TokenResponse> {
        validate_email(&req.email)?;
        validate_password(&req.password)?;

        let email = req.email.trim();
        let target = format!("Email: {email}");

        let Some(user) = self.storage.users.find_by_email(email).await? else {
            self.audit("Failed login attempt", AuditActor::Anonymous, target)
                .await;
            return Err(invalid_credentials());
        };

        if !verify_password(&req.password, &user.password_hash)? {
            self.audit("Failed login attempt", user.id, target).await;
            return Err(invalid_credentials());
        }

        let token = self.tokens.issue(user.id, user.role_id)?;
        self.audit("User logged in", user.id, target).await;

        Ok(TokenResponse { token })
    }

    /// `POST /auth/register`.
    pub async fn register(
        &self,
        actor: &Principal,
        req: CreateUserRequest,
    ) -> ServiceResult<UserWithRole> {
        let created = self.create_user_with_role(req).await?;
        self.audit(
            "User registered",
            actor.user_id,
            format!("Username: {}", created.user.username),
        )
        .await;
        Ok(created)
    }

    /// Validation, uniqueness and role lookup shared by register and create.
    pub(super) async fn create_user_with_role(
        &self,
        req: CreateUserRequest,
    ) -> ServiceResult<UserWithRole> {
        validate_username(&req.username)?;
        validate_email(&req.email)?;
        validate_password(&req.password)?;
        let role_name: RoleName = req
            .role
            .trim()
            .parse()
            .map_err(|_| ApiError::validation("Role must be one of ADMIN, MANAGER, EMPLOYEE."))?;

        let email = req.email.trim().to_string();
        if self.storage.users.find_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("User with this email already exists"));
        }

        let role = self
            .role_by_name(role_name)
            .await?
            .ok_or_else(|| ApiError::not_found("Role not found"))?;

        let user = self
            .insert_user(NewUser {
                username: req.username.trim().to_string(),
                email,
                password_hash: hash_password(&req.password)?,
                role_id: role.id,
            })
            .await?;

        Ok(UserWithRole {
            user,
            role: Some(role),
        })
    }

    async fn insert_user(&self, user: NewUser) -> ServiceResult<UserRecord> {
        self.storage.users.insert(user).await.map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::conflict("User with this email already exists"),
            other => other.into(),
        })
    }
}
