//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind server to listener with graceful shutdown
//! - Translate signup submissions into the intake pipeline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::http::request::{
    propagate_request_id_layer, set_request_id_layer, ClientIp, X_REQUEST_ID,
};
use crate::security::AuthGate;
use crate::signup::{AdminRetrieval, SignupAck, SignupForm, SignupIntake};
use crate::store::AuditSink;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub intake: Arc<SignupIntake>,
    pub retrieval: Arc<AdminRetrieval>,
    pub auth: Arc<AuthGate>,
    pub audit: Arc<dyn AuditSink>,
}

/// HTTP server for the waitlist service.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
}

impl HttpServer {
    /// Create a new HTTP server around fully assembled state.
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/waitlist", post(submit_signup))
            .route("/healthz", get(healthz))
            .with_state(state.clone())
            .merge(admin::setup_admin_router(state))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(middleware::map_response(mask_oversized_body))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id_layer())
    }

    /// The assembled router, for in-process callers.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Span for one request, tagged with the id set by the outermost layer.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Public signup endpoint.
async fn submit_signup(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SignupAck>, ServiceError> {
    let body = body.map_err(|_| ServiceError::invalid_request("body"))?;
    let form: SignupForm =
        serde_json::from_slice(&body).map_err(|_| ServiceError::invalid_request("body"))?;
    let ack = state.intake.submit(form, &client_ip).await?;
    Ok(Json(ack))
}

/// An oversized body is just another malformed request to the caller.
async fn mask_oversized_body(response: Response) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::invalid_request("body").into_response()
    } else {
        response
    }
}

/// Liveness only; touches no external state.
async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
