use axum::{extract::Extension, http::StatusCode, Json};

use teamgate_auth::Principal;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Echo the identity the Gate admitted, with the role resolved at request time.
pub async fn whoami(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
