//! Timeout enforcement for store calls.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::observability::metrics;
use crate::store::StoreError;

/// Run `fut` with a deadline. Expiry becomes `StoreError::Timeout`.
pub async fn with_deadline<T, F>(op: &'static str, deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline.as_millis() as u64)),
    };
    metrics::record_store_call(op, result.is_ok(), start);
    result
}
