//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to counter/object store:
//!     → timeouts.rs (enforce per-call deadline, record latency)
//!     → caller decides: fail open (rate limit), skip (retrieval), fatal (intake)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout is reported as the call's ordinary error, not a panic or hang

pub mod timeouts;

pub use timeouts::with_deadline;
