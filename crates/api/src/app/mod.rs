//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services/`: domain operations (precondition checks, persistence, audit)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use teamgate_auth::TokenService;
use teamgate_infra::Storage;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(storage: Storage, tokens: TokenService) -> Router {
    let services = services::build_services(storage, tokens);

    routes::router(&services).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(Extension(services)),
    )
}
