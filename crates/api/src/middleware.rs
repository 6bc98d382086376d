use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use tracing::{debug, error, warn};

use teamgate_auth::RoleName;

use crate::app::errors::ApiError;
use crate::authz::{Gate, GateError};

/// Middleware state: the shared Gate plus one route's required roles.
#[derive(Clone)]
pub struct GateState {
    gate: Gate,
    required: &'static [RoleName],
}

impl GateState {
    pub fn new(gate: Gate, required: &'static [RoleName]) -> Self {
        Self { gate, required }
    }
}

/// Admit or reject the request. On success the resolved
/// [`teamgate_auth::Principal`] is inserted into the request extensions.
pub async fn gate_middleware(
    State(state): State<GateState>,
    mut req: Request,
    next: Next,
) -> Response {
    // A non-UTF-8 header is a credential that cannot be parsed, not a missing one.
    let header = match req.headers().get(AUTHORIZATION).map(|v| v.to_str()) {
        Some(Ok(value)) => Some(value.to_string()),
        Some(Err(_)) => Some(String::from("<invalid>")),
        None => None,
    };

    match state.gate.admit(header.as_deref(), state.required).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => {
            let path = req.uri().path();
            match &err {
                GateError::MissingCredential => {
                    debug!(reason = err.reason(), path, "request rejected by gate")
                }
                GateError::Storage(e) => {
                    error!(reason = err.reason(), path, error = %e, "gate role lookup failed")
                }
                other => warn!(reason = other.reason(), path, detail = %other, "request rejected by gate"),
            }
            ApiError::from(err).into_response()
        }
    }
}

/// Put a method route behind the Gate with the given required roles.
pub fn guarded(route: MethodRouter, gate: &Gate, required: &'static [RoleName]) -> MethodRouter {
    route.route_layer(axum::middleware::from_fn_with_state(
        GateState::new(gate.clone(), required),
        gate_middleware,
    ))
}
