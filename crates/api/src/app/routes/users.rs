use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};

use teamgate_auth::{Principal, UserRecord};
use teamgate_core::UserId;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::{Gate, ADMIN_ONLY, ADMIN_OR_MANAGER, ANY_ROLE};
use crate::middleware::guarded;

pub fn router(gate: &Gate) -> Router {
    Router::new()
        .route(
            "/",
            guarded(post(create_user), gate, ADMIN_ONLY)
                .merge(guarded(get(list_users), gate, ADMIN_OR_MANAGER)),
        )
        .route(
            "/:id",
            guarded(get(get_user), gate, ANY_ROLE).merge(guarded(
                put(update_user).merge(delete(delete_user)),
                gate,
                ADMIN_ONLY,
            )),
        )
        .route("/restore/:id", guarded(patch(restore_user), gate, ADMIN_ONLY))
        .route("/:id/assign-role", guarded(post(assign_role), gate, ADMIN_ONLY))
        .route("/:id/revoke-role", guarded(post(revoke_role), gate, ADMIN_ONLY))
}

fn parse_id(raw: &str) -> Result<UserId, ApiError> {
    Ok(raw.trim().parse::<UserId>()?)
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let user = services.create_user(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// GET /users - non-admin users with their roles.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<dto::UserWithRole>>, ApiError> {
    Ok(Json(services.list_users(&principal).await?))
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<dto::UserWithRole>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.get_user(&principal, id).await?))
}

/// PUT /users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(services.update_user(&principal, id, body).await?))
}

/// DELETE /users/:id - soft delete.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.delete_user(&principal, id).await?))
}

/// PATCH /users/restore/:id
pub async fn restore_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.restore_user(&principal, id).await?))
}

/// POST /users/:id/assign-role
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::AssignRoleRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(
        services.assign_role(&principal, id, &body.role_name).await?,
    ))
}

/// POST /users/:id/revoke-role - back to the default role.
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.revoke_role(&principal, id).await?))
}
