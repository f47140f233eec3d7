use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ServiceError;
use crate::http::request::ClientIp;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::AuthError;
use crate::store::AuditEntry;

/// Reject admin requests without a valid token. Every attempt is audited.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    request: Request<Body>,
    next: Next,
) -> Response {
    match state.auth.authorize_headers(request.headers()) {
        Ok(()) => {
            metrics::record_admin_auth("ok");
            state
                .audit
                .record(AuditEntry::new("admin.auth", &client_ip, true, None));
            next.run(request).await
        }
        Err(e) => {
            let outcome = match e {
                AuthError::Unauthorized => "unauthorized",
                AuthError::NotConfigured => "not_configured",
            };
            metrics::record_admin_auth(outcome);
            tracing::warn!(client = %client_ip, outcome, "Admin authentication rejected");
            state
                .audit
                .record(AuditEntry::new("admin.auth", &client_ip, false, Some(outcome)));
            ServiceError::from(e).into_response()
        }
    }
}
