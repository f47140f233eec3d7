use axum::{
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::admin::AdminRequest;
use crate::http::server::AppState;
use crate::signup::retrieval::{clamp_limit, ListQuery};
use crate::store::AuditEntry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub encryption: &'static str,
    pub storage: &'static str,
}

/// `signups`: one page of stored signups. Every call is audited.
pub fn list_signups(state: AppState, req: AdminRequest) -> BoxFuture<'static, Response> {
    async move {
        let admin = &state.config.admin;
        let query = ListQuery {
            filter_email: req.params.get("email").cloned(),
            cursor: req.params.get("cursor").filter(|c| !c.is_empty()).cloned(),
            limit: clamp_limit(
                req.params.get("limit").map(String::as_str),
                admin.default_page_size,
                admin.max_page_size,
            ),
        };
        let filtered = query.filter_email.is_some();

        let result = state.retrieval.list(query).await;
        let reason = result.as_ref().err().map(ToString::to_string);
        state.audit.record(AuditEntry::new(
            "signups.list",
            &req.client_ip,
            result.is_ok(),
            reason.as_deref(),
        ));

        match result {
            Ok(page) => {
                tracing::info!(
                    returned = page.signups.len(),
                    has_more = page.has_more,
                    filtered,
                    "Admin listed signups"
                );
                Json(page).into_response()
            }
            Err(e) => e.into_response(),
        }
    }
    .boxed()
}

/// `status`: version and whether records are being encrypted.
pub fn get_status(state: AppState, _req: AdminRequest) -> BoxFuture<'static, Response> {
    async move {
        let encryption = if state.intake.codec().is_plaintext() {
            "disabled"
        } else {
            "aes-256-gcm"
        };
        Json(SystemStatus {
            version: env!("CARGO_PKG_VERSION"),
            status: "operational",
            encryption,
            storage: state.config.storage.backend.as_str(),
        })
        .into_response()
    }
    .boxed()
}
