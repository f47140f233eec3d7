//! Storage collaborators.
//!
//! # Data Flow
//! ```text
//! RateLimiter      → counter.rs (atomic increment with TTL)
//! SignupIntake     → object.rs  (write-once put)
//! AdminRetrieval   → object.rs  (prefix listing with cursor, per-object get)
//! AuthGate/Admin   → audit.rs   (fire-and-forget audit entries)
//! ```
//!
//! # Design Decisions
//! - Each collaborator is a trait object so deployments can swap in a shared
//!   networked store without touching the pipeline
//! - In-process and filesystem implementations ship for standalone runs

pub mod audit;
pub mod counter;
pub mod object;

use thiserror::Error;

pub use audit::{AuditEntry, AuditSink, FileAuditSink, MemoryAuditSink, TracingAuditSink};
pub use counter::{CounterStore, InMemoryCounterStore};
pub use object::{FsObjectStore, InMemoryObjectStore, ListPage, ObjectMeta, ObjectStore};

/// Errors raised by counter and object stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline.
    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    /// Write-once key already holds an object.
    #[error("object already exists: {0}")]
    Conflict(String),

    /// Pagination cursor was not issued for this listing.
    #[error("invalid pagination cursor")]
    InvalidCursor,

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),
}
