//! Admin surface: authenticated command dispatch.
//!
//! `GET /api/admin/{action}` looks `action` up in [`ACTIONS`] and runs the
//! matching handler. Every request passes the auth middleware first.

pub mod auth;
pub mod handlers;

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::future::BoxFuture;

use self::auth::admin_auth_middleware;
use crate::http::request::ClientIp;
use crate::http::response::ErrorBody;
use crate::http::server::AppState;

/// Inputs every admin action receives.
#[derive(Debug, Clone, Default)]
pub struct AdminRequest {
    pub params: HashMap<String, String>,
    pub client_ip: String,
}

pub type ActionHandler = fn(AppState, AdminRequest) -> BoxFuture<'static, Response>;

/// Action name → handler.
pub static ACTIONS: &[(&str, ActionHandler)] = &[
    ("signups", handlers::list_signups as ActionHandler),
    ("status", handlers::get_status as ActionHandler),
];

pub fn lookup_action(name: &str) -> Option<ActionHandler> {
    ACTIONS
        .iter()
        .find(|(action, _)| *action == name)
        .map(|(_, handler)| *handler)
}

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/{action}", get(dispatch))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

async fn dispatch(
    State(state): State<AppState>,
    Path(action): Path<String>,
    ClientIp(client_ip): ClientIp,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match lookup_action(&action) {
        Some(handler) => handler(state, AdminRequest { params, client_ip }).await,
        None => {
            tracing::debug!(action = %action, "Unknown admin action");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody::message("Unknown action")),
            )
                .into_response()
        }
    }
}
