use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use teamgate_auth::Principal;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::{Gate, ADMIN_ONLY};
use crate::middleware::guarded;

pub fn router(gate: &Gate) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/register", guarded(post(register), gate, ADMIN_ONLY))
}

/// POST /auth/signup - bootstrap the first administrator (public).
pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SignupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let admin = services.signup(body).await?;
    Ok((StatusCode::CREATED, Json(admin)).into_response())
}

/// POST /auth/login - exchange credentials for a bearer token (public).
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Result<Json<dto::TokenResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(services.login(body).await?))
}

/// POST /auth/register - create a user with a role (ADMIN).
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let user = services.register(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}
