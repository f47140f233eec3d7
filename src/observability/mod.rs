//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All components produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated secrets or raw emails
//! - Request ID flows through every log line via the trace span
//! - Metrics are cheap (atomic increments) and always recorded

pub mod logging;
pub mod metrics;
