//! Signup write path.
//!
//! # Stages
//! ```text
//! received → honeypot → shape + email format → ip limit → email limit
//!          → consent → encode → store → accepted
//! ```
//! Each stage short-circuits. Nothing before the rate limit stages touches a
//! counter, so malformed input never burns a slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::error::ServiceError;
use crate::observability::metrics;
use crate::privacy::{EncryptionError, EnvelopeCodec, IdentityHasher};
use crate::resilience::with_deadline;
use crate::security::{LimitScope, RateLimiter};
use crate::signup::model::{SignupForm, SignupRecord};
use crate::signup::SIGNUP_PREFIX;
use crate::store::ObjectStore;

pub const ACK_MESSAGE: &str = "Thanks for joining the waitlist!";

/// Response to an accepted signup. Carries no identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupAck {
    pub message: &'static str,
}

impl Default for SignupAck {
    fn default() -> Self {
        Self {
            message: ACK_MESSAGE,
        }
    }
}

/// Storage key for a new record: `signups/{hash}_{uuidv7}`.
pub fn storage_key(email_hash: &str) -> String {
    format!("{SIGNUP_PREFIX}{email_hash}_{}", Uuid::now_v7().simple())
}

pub struct SignupIntake {
    hasher: IdentityHasher,
    limiter: RateLimiter,
    limits: RateLimitConfig,
    codec: EnvelopeCodec,
    objects: Arc<dyn ObjectStore>,
    store_timeout: Duration,
}

impl SignupIntake {
    pub fn new(
        hasher: IdentityHasher,
        limiter: RateLimiter,
        limits: RateLimitConfig,
        codec: EnvelopeCodec,
        objects: Arc<dyn ObjectStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            hasher,
            limiter,
            limits,
            codec,
            objects,
            store_timeout,
        }
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// Run a submission through the pipeline.
    pub async fn submit(
        &self,
        form: SignupForm,
        client_ip: &str,
    ) -> Result<SignupAck, ServiceError> {
        if form.honeypot_tripped() {
            tracing::info!(client = %client_ip, "Honeypot field populated; rejecting");
            metrics::record_signup("honeypot");
            return Err(ServiceError::invalid_request("body"));
        }

        let signup = form.validate().inspect_err(|_| metrics::record_signup("invalid"))?;
        let email_hash = self.hasher.hash(&signup.email);

        if self.limits.enabled {
            self.enforce(LimitScope::Ip, client_ip).await?;
            self.enforce(LimitScope::Email, &email_hash).await?;
        }

        if signup.consent_to_contact != Some(true) {
            metrics::record_signup("invalid");
            return Err(ServiceError::consent_required());
        }

        let record = SignupRecord::accept(signup, Utc::now());
        let json = serde_json::to_vec(&record)
            .map_err(|e| EncryptionError::Encoding(e.to_string()))?;
        let body = self.codec.encode(&json).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to encrypt signup record");
            metrics::record_signup("error");
        })?;

        let key = storage_key(&email_hash);
        with_deadline("object.put", self.store_timeout, self.objects.put(&key, body))
            .await
            .inspect_err(|e| {
                tracing::error!(email_hash = %email_hash, error = %e, "Failed to store signup record");
                metrics::record_signup("error");
            })?;

        tracing::info!(
            email_hash = %email_hash,
            encrypted = !self.codec.is_plaintext(),
            "Signup accepted"
        );
        metrics::record_signup("accepted");
        Ok(SignupAck::default())
    }

    async fn enforce(&self, scope: LimitScope, identity: &str) -> Result<(), ServiceError> {
        let limit = match scope {
            LimitScope::Ip => &self.limits.ip,
            LimitScope::Email => &self.limits.email,
        };
        let decision = self.limiter.check_scope(scope, identity, limit).await;
        if decision.limited {
            metrics::record_signup("rate_limited");
            return Err(ServiceError::RateLimited {
                scope,
                retry_after: decision.retry_after,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowLimit;
    use crate::error::{CONSENT_REQUIRED, INVALID_REQUEST};
    use crate::store::{InMemoryCounterStore, InMemoryObjectStore, StoreError};
    use async_trait::async_trait;

    const KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    struct BrokenObjects;

    #[async_trait]
    impl ObjectStore for BrokenObjects {
        async fn put(&self, _key: &str, _body: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("bucket /var/secret unreachable".into()))
        }
        async fn list(
            &self,
            _prefix: &str,
            _cursor: Option<&str>,
            _limit: usize,
        ) -> Result<crate::store::ListPage, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    fn limits(ip: u64, email: u64) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            ip: WindowLimit {
                limit: ip,
                window_secs: 60,
            },
            email: WindowLimit {
                limit: email,
                window_secs: 60,
            },
        }
    }

    fn intake(
        objects: Arc<dyn ObjectStore>,
        counters: Arc<InMemoryCounterStore>,
        limits: RateLimitConfig,
        key: Option<&str>,
    ) -> SignupIntake {
        SignupIntake::new(
            IdentityHasher::default(),
            RateLimiter::new(counters, Duration::from_secs(1)),
            limits,
            EnvelopeCodec::new(key.map(str::to_string)),
            objects,
            Duration::from_secs(1),
        )
    }

    fn form(email: &str) -> SignupForm {
        SignupForm {
            full_name: Some("Grace Hopper".into()),
            email: Some(email.into()),
            main_interest: Some("Compilers".into()),
            policy_version: Some("v3".into()),
            consent_to_contact: Some(true),
            company: None,
        }
    }

    #[tokio::test]
    async fn accepted_record_is_encrypted_under_hashed_key() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let intake = intake(
            objects.clone(),
            Arc::new(InMemoryCounterStore::new()),
            limits(10, 10),
            Some(KEY),
        );

        let ack = intake.submit(form(" Grace@Navy.MIL "), "10.0.0.1").await.unwrap();
        assert_eq!(ack, SignupAck::default());

        let keys = objects.keys().await;
        assert_eq!(keys.len(), 1);
        let hash = IdentityHasher::default().hash("grace@navy.mil");
        assert!(keys[0].starts_with(&format!("signups/{hash}_")));

        let stored = objects.get(&keys[0]).await.unwrap().unwrap();
        assert!(!String::from_utf8_lossy(&stored).contains("grace"));
        let record: SignupRecord =
            serde_json::from_slice(&intake.codec().decode(&stored).unwrap()).unwrap();
        assert_eq!(record.email, "grace@navy.mil");
        assert!(record.consent_to_contact);
    }

    #[tokio::test]
    async fn honeypot_rejects_before_any_counter_is_touched() {
        let counters = Arc::new(InMemoryCounterStore::new());
        let intake = intake(
            Arc::new(InMemoryObjectStore::new()),
            counters.clone(),
            limits(10, 10),
            None,
        );
        let mut f = form("grace@navy.mil");
        f.company = Some("Bots Inc".into());

        let err = intake.submit(f, "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { message, .. } if message == INVALID_REQUEST));
        assert!(counters.is_empty());
    }

    #[tokio::test]
    async fn malformed_email_does_not_consume_rate_limit() {
        let counters = Arc::new(InMemoryCounterStore::new());
        let intake = intake(
            Arc::new(InMemoryObjectStore::new()),
            counters.clone(),
            limits(1, 1),
            None,
        );
        for _ in 0..3 {
            assert!(intake.submit(form("broken"), "10.0.0.1").await.is_err());
        }
        assert!(counters.is_empty());
        assert!(intake.submit(form("ok@example.com"), "10.0.0.1").await.is_ok());
    }

    #[tokio::test]
    async fn ip_then_email_limits() {
        let intake = intake(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryCounterStore::new()),
            limits(2, 1),
            None,
        );
        intake.submit(form("a@example.com"), "10.0.0.1").await.unwrap();

        let err = intake.submit(form("a@example.com"), "10.0.0.2").await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { scope: LimitScope::Email, .. }));

        intake.submit(form("b@example.com"), "10.0.0.1").await.unwrap();
        let err = intake.submit(form("c@example.com"), "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { scope: LimitScope::Ip, retry_after } if retry_after > Duration::ZERO));
    }

    #[tokio::test]
    async fn consent_must_be_true() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let intake = intake(
            objects.clone(),
            Arc::new(InMemoryCounterStore::new()),
            limits(10, 10),
            None,
        );
        for consent in [None, Some(false)] {
            let mut f = form("a@example.com");
            f.consent_to_contact = consent;
            let err = intake.submit(f, "10.0.0.1").await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation { message, .. } if message == CONSENT_REQUIRED));
        }
        assert_eq!(objects.len().await, 0);
    }

    #[tokio::test]
    async fn malformed_key_rejects_instead_of_storing_plaintext() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let intake = intake(
            objects.clone(),
            Arc::new(InMemoryCounterStore::new()),
            limits(10, 10),
            Some("definitely-not-a-key"),
        );
        let err = intake.submit(form("a@example.com"), "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Encryption(EncryptionError::MalformedKey)));
        assert_eq!(objects.len().await, 0);
    }

    #[tokio::test]
    async fn storage_failure_is_fatal() {
        let intake = intake(
            Arc::new(BrokenObjects),
            Arc::new(InMemoryCounterStore::new()),
            limits(10, 10),
            None,
        );
        let err = intake.submit(form("a@example.com"), "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn storage_keys_are_unique_and_prefixed() {
        let a = storage_key("abcd");
        let b = storage_key("abcd");
        assert_ne!(a, b);
        assert!(a.starts_with("signups/abcd_"));
        assert_eq!(a.len(), "signups/abcd_".len() + 32);
    }
}
