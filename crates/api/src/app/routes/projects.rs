use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};

use teamgate_auth::Principal;
use teamgate_core::ProjectId;
use teamgate_projects::ProjectRecord;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::{Gate, ADMIN_ONLY, ANY_ROLE};
use crate::middleware::guarded;

pub fn router(gate: &Gate) -> Router {
    Router::new()
        .route(
            "/",
            guarded(post(create_project), gate, ADMIN_ONLY)
                .merge(guarded(get(list_projects), gate, ANY_ROLE)),
        )
        .route(
            "/:id",
            guarded(get(get_project), gate, ANY_ROLE).merge(guarded(
                put(update_project).merge(delete(delete_project)),
                gate,
                ADMIN_ONLY,
            )),
        )
        .route("/restore/:id", guarded(patch(restore_project), gate, ADMIN_ONLY))
}

fn parse_id(raw: &str) -> Result<ProjectId, ApiError> {
    Ok(raw.trim().parse::<ProjectId>()?)
}

/// POST /projects
pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CreateProjectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let project = services.create_project(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

/// GET /projects - all for ADMIN, assigned ones for everyone else.
pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<ProjectRecord>>, ApiError> {
    Ok(Json(services.list_projects(&principal).await?))
}

/// GET /projects/:id
pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.get_project(&principal, id).await?))
}

/// PUT /projects/:id
pub async fn update_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateProjectRequest>, JsonRejection>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(services.update_project(&principal, id, body).await?))
}

/// DELETE /projects/:id - soft delete.
pub async fn delete_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.delete_project(&principal, id).await?))
}

/// PATCH /projects/restore/:id
pub async fn restore_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<ProjectRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(services.restore_project(&principal, id).await?))
}
