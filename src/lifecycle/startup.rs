//! Startup orchestration.
//!
//! Turns a validated [`ServiceConfig`] into the shared [`AppState`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ServiceConfig, StorageBackend};
use crate::http::server::AppState;
use crate::privacy::{EnvelopeCodec, IdentityHasher};
use crate::security::{AuthGate, RateLimiter};
use crate::signup::{AdminRetrieval, SignupIntake};
use crate::store::{
    AuditSink, CounterStore, FileAuditSink, FsObjectStore, InMemoryCounterStore,
    InMemoryObjectStore, ObjectStore, StoreError, TracingAuditSink,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open object store: {0}")]
    Storage(#[from] StoreError),
}

/// External collaborators the pipeline runs against.
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<dyn CounterStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub audit: Arc<dyn AuditSink>,
}

/// Open the stores named in `config` and assemble the application state.
pub async fn build_state(config: ServiceConfig) -> Result<AppState, StartupError> {
    let objects: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; signups are lost on restart");
            Arc::new(InMemoryObjectStore::new())
        }
        StorageBackend::Filesystem => {
            Arc::new(FsObjectStore::open(config.storage.root_dir.clone()).await?)
        }
    };

    let audit: Arc<dyn AuditSink> = match &config.audit.log_path {
        Some(path) => Arc::new(FileAuditSink::spawn(path.clone())),
        None => Arc::new(TracingAuditSink),
    };

    let stores = Stores {
        counters: Arc::new(InMemoryCounterStore::new()),
        objects,
        audit,
    };
    Ok(assemble(config, stores))
}

/// Wire pipeline components over the given stores.
pub fn assemble(config: ServiceConfig, stores: Stores) -> AppState {
    let store_timeout = Duration::from_millis(config.timeouts.store_call_ms);
    let hasher = IdentityHasher::new(config.storage.hash_prefix_len);
    let codec = EnvelopeCodec::new(
        config
            .encryption
            .key
            .as_ref()
            .map(|k| k.expose().clone()),
    );

    if codec.is_plaintext() {
        tracing::warn!(
            "!!! No encryption key configured: signup records (names, emails) will be \
             stored as PLAINTEXT. Set WAITLIST_ENCRYPTION_KEY before accepting real traffic."
        );
    }
    if config.admin.token.is_none() {
        tracing::warn!("No admin token configured; admin endpoints will answer 503");
    }
    if !config.rate_limit.enabled {
        tracing::warn!("Signup rate limiting is disabled");
    }

    let limiter = RateLimiter::new(stores.counters, store_timeout);
    let intake = SignupIntake::new(
        hasher,
        limiter,
        config.rate_limit.clone(),
        codec.clone(),
        stores.objects.clone(),
        store_timeout,
    );
    let retrieval = AdminRetrieval::new(hasher, codec, stores.objects, store_timeout);
    let auth = AuthGate::new(config.admin.token.clone());

    AppState {
        config: Arc::new(config),
        intake: Arc::new(intake),
        retrieval: Arc::new(retrieval),
        auth: Arc::new(auth),
        audit: stores.audit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_backend_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.backend = StorageBackend::Filesystem;
        config.storage.root_dir = dir.path().join("records");

        let state = build_state(config).await.unwrap();
        assert!(dir.path().join("records").is_dir());
        assert!(state.intake.codec().is_plaintext());
        assert!(!state.auth.is_configured());
    }
}
