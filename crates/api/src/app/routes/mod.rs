use axum::{routing::get, Router};

use crate::app::services::AppServices;
use crate::authz::ANY_ROLE;
use crate::middleware::guarded;

pub mod audit_logs;
pub mod auth;
pub mod projects;
pub mod system;
pub mod users;

/// Every route. Protected routes carry their own required-role set.
pub fn router(services: &AppServices) -> Router {
    let gate = services.gate();

    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", guarded(get(system::whoami), &gate, ANY_ROLE))
        .nest("/auth", auth::router(&gate))
        .nest("/users", users::router(&gate))
        .nest("/projects", projects::router(&gate))
        .nest("/audit-logs", audit_logs::router(&gate))
}
