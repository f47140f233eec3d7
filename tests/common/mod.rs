//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use waitlist_intake::config::ServiceConfig;
use waitlist_intake::lifecycle::{assemble, Stores};
use waitlist_intake::privacy::EnvelopeCodec;
use waitlist_intake::security::Sensitive;
use waitlist_intake::signup::SignupRecord;
use waitlist_intake::store::{
    InMemoryCounterStore, InMemoryObjectStore, ListPage, MemoryAuditSink, ObjectStore, StoreError,
};
use waitlist_intake::HttpServer;

pub const ADMIN_TOKEN: &str = "integration-admin-token";
pub const ENCRYPTION_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

pub struct TestApp {
    pub router: Router,
    pub counters: Arc<InMemoryCounterStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub codec: EnvelopeCodec,
}

/// Config with an admin token, an encryption key and forwarded-for trust so
/// tests can pick client IPs.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.admin.token = Some(Sensitive(ADMIN_TOKEN.to_string()));
    config.encryption.key = Some(Sensitive(ENCRYPTION_KEY.to_string()));
    config.security.trust_forwarded_for = true;
    config
}

pub fn spawn_app(config: ServiceConfig, objects: Arc<dyn ObjectStore>) -> TestApp {
    let counters = Arc::new(InMemoryCounterStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let codec = EnvelopeCodec::new(config.encryption.key.as_ref().map(|k| k.expose().clone()));
    let state = assemble(
        config,
        Stores {
            counters: counters.clone(),
            objects,
            audit: audit.clone(),
        },
    );
    TestApp {
        router: HttpServer::new(state).router(),
        counters,
        audit,
        codec,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn valid_signup(email: &str) -> Value {
    json!({
        "fullName": "Katherine Johnson",
        "email": email,
        "mainInterest": "Orbital mechanics",
        "policyVersion": "2024-06",
        "consentToContact": true,
    })
}

pub fn signup_request(body: &Value, client_ip: &str) -> Request<Body> {
    raw_signup_request(body.to_string(), client_ip)
}

pub fn raw_signup_request(body: String, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/waitlist")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(body))
        .unwrap()
}

pub fn admin_request(path_and_query: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(path_and_query)
        .header("x-forwarded-for", "192.0.2.10");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn bearer() -> String {
    format!("Bearer {ADMIN_TOKEN}")
}

pub fn record(email: &str, signup_date: DateTime<Utc>) -> SignupRecord {
    SignupRecord {
        email: email.to_string(),
        full_name: "Seeded".to_string(),
        main_interest: "Testing".to_string(),
        policy_version: "1".to_string(),
        consent_to_contact: true,
        consent_timestamp: signup_date,
        signup_date,
    }
}

/// Encode and store `record` under an explicit key.
pub async fn seed(objects: &dyn ObjectStore, codec: &EnvelopeCodec, key: &str, record: &SignupRecord) {
    let json = serde_json::to_vec(record).unwrap();
    objects.put(key, codec.encode(&json).unwrap()).await.unwrap();
}

/// Counts calls and fails `get` for chosen keys.
#[derive(Default)]
pub struct InstrumentedObjectStore {
    pub inner: InMemoryObjectStore,
    pub failing_gets: HashSet<String>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub fail_puts: bool,
}

impl InstrumentedObjectStore {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InstrumentedObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        if self.fail_puts {
            return Err(StoreError::Unavailable(
                "s3://waitlist-prod/signups: connection reset".into(),
            ));
        }
        self.inner.put(key, body).await
    }

    async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(prefix, cursor, limit).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_gets.contains(key) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.get(key).await
    }
}
