//! Admin read path: list, fetch concurrently, keep what decodes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::error::{ServiceError, INVALID_CURSOR};
use crate::observability::metrics;
use crate::privacy::{normalize_email, DecryptionError, EnvelopeCodec, IdentityHasher};
use crate::resilience::with_deadline;
use crate::signup::model::{is_valid_email, SignupRecord};
use crate::signup::SIGNUP_PREFIX;
use crate::store::{ObjectStore, StoreError};

/// Parsed admin listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter_email: Option<String>,
    pub cursor: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupPage {
    pub signups: Vec<SignupRecord>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Accept `raw` only when it parses into `1..=max`; otherwise use `default`.
pub fn clamp_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| (1..=max).contains(n))
        .unwrap_or(default)
}

/// Why one record was dropped from a page.
#[derive(Debug, Error)]
enum RecordFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] StoreError),

    #[error("object vanished after listing")]
    Missing,

    #[error(transparent)]
    Decrypt(#[from] DecryptionError),

    #[error("record JSON invalid: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RecordFailure {
    fn reason(&self) -> &'static str {
        match self {
            RecordFailure::Fetch(StoreError::Timeout(_)) => "timeout",
            RecordFailure::Fetch(_) => "fetch",
            RecordFailure::Missing => "missing",
            RecordFailure::Decrypt(e) => e.reason(),
            RecordFailure::Parse(_) => "parse",
        }
    }
}

pub struct AdminRetrieval {
    hasher: IdentityHasher,
    codec: EnvelopeCodec,
    objects: Arc<dyn ObjectStore>,
    store_timeout: Duration,
}

impl AdminRetrieval {
    pub fn new(
        hasher: IdentityHasher,
        codec: EnvelopeCodec,
        objects: Arc<dyn ObjectStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            hasher,
            codec,
            objects,
            store_timeout,
        }
    }

    /// Listing prefix for an optional email filter.
    fn prefix_for(&self, filter_email: Option<&str>) -> Result<String, ServiceError> {
        match filter_email {
            None => Ok(SIGNUP_PREFIX.to_string()),
            Some(raw) => {
                let email = normalize_email(raw);
                if !is_valid_email(&email) {
                    return Err(ServiceError::invalid_email("email"));
                }
                Ok(format!("{SIGNUP_PREFIX}{}_", self.hasher.hash(&email)))
            }
        }
    }

    /// One page of signups, newest first. Records that fail to fetch or
    /// decode are left out; `has_more` and `cursor` follow the listing.
    pub async fn list(&self, query: ListQuery) -> Result<SignupPage, ServiceError> {
        let prefix = self.prefix_for(query.filter_email.as_deref())?;

        let page = with_deadline(
            "object.list",
            self.store_timeout,
            self.objects
                .list(&prefix, query.cursor.as_deref(), query.limit.max(1)),
        )
        .await
        .map_err(|e| match e {
            StoreError::InvalidCursor => ServiceError::Validation {
                field: "cursor",
                message: INVALID_CURSOR,
            },
            other => ServiceError::Storage(other),
        })?;

        let listed = page.objects.len();
        let fetches = page.objects.iter().map(|o| self.fetch_record(&o.key));
        let mut signups: Vec<SignupRecord> = join_all(fetches).await.into_iter().flatten().collect();
        signups.sort_by(|a, b| b.signup_date.cmp(&a.signup_date));

        if signups.len() < listed {
            tracing::warn!(
                listed,
                decoded = signups.len(),
                "Some signup records could not be read"
            );
        }

        Ok(SignupPage {
            signups,
            cursor: page.cursor,
            has_more: page.has_more,
        })
    }

    async fn fetch_record(&self, key: &str) -> Option<SignupRecord> {
        match self.load(key).await {
            Ok(record) => Some(record),
            Err(e) => {
                metrics::record_decode_failure(e.reason());
                tracing::warn!(key = %key, reason = e.reason(), error = %e, "Skipping unreadable signup record");
                None
            }
        }
    }

    async fn load(&self, key: &str) -> Result<SignupRecord, RecordFailure> {
        let stored = with_deadline("object.get", self.store_timeout, self.objects.get(key))
            .await?
            .ok_or(RecordFailure::Missing)?;
        let json = self.codec.decode(&stored)?;
        Ok(serde_json::from_slice(&json)?)
    }
}
