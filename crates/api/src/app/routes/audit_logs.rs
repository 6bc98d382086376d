use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use teamgate_infra::AuditLogView;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::{Gate, ADMIN_ONLY};
use crate::middleware::guarded;

pub fn router(gate: &Gate) -> Router {
    Router::new().route("/", guarded(get(list_audit_logs), gate, ADMIN_ONLY))
}

/// GET /audit-logs - every entry, oldest first, with its actor.
pub async fn list_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<AuditLogView>>, ApiError> {
    Ok(Json(services.audit_logs().await?))
}
