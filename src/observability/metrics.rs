//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waitlist_signups_total` (counter): intake outcomes by `outcome`
//! - `waitlist_rate_limited_total` (counter): rejected submissions by `scope`
//! - `waitlist_rate_limiter_fail_open_total` (counter): counter store outages by `scope`
//! - `waitlist_plaintext_writes_total` (counter): records stored without encryption
//! - `waitlist_record_decode_failures_total` (counter): skipped records by `reason`
//! - `waitlist_admin_auth_total` (counter): admin auth attempts by `outcome`
//! - `waitlist_store_call_duration_seconds` (histogram): store latency by `op`, `result`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_signup(outcome: &'static str) {
    ::metrics::counter!("waitlist_signups_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(scope: &'static str) {
    ::metrics::counter!("waitlist_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_rate_limiter_fail_open(scope: &'static str) {
    ::metrics::counter!("waitlist_rate_limiter_fail_open_total", "scope" => scope).increment(1);
}

pub fn record_plaintext_write() {
    ::metrics::counter!("waitlist_plaintext_writes_total").increment(1);
}

pub fn record_decode_failure(reason: &'static str) {
    ::metrics::counter!("waitlist_record_decode_failures_total", "reason" => reason).increment(1);
}

pub fn record_admin_auth(outcome: &'static str) {
    ::metrics::counter!("waitlist_admin_auth_total", "outcome" => outcome).increment(1);
}

pub fn record_store_call(op: &'static str, ok: bool, start: Instant) {
    let result = if ok { "ok" } else { "error" };
    ::metrics::histogram!(
        "waitlist_store_call_duration_seconds",
        "op" => op,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}
