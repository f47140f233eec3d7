//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Signup request:
//!     → rate_limit.rs (per-IP, then per-email fixed windows)
//!
//! Admin request:
//!     → auth.rs (extract token, constant-time compare)
//! ```
//!
//! # Design Decisions
//! - Admin auth fails closed; rate limiting fails open on store outage
//! - Secrets never reach logs (`Sensitive`)
//! - No trust in client input

pub mod auth;
pub mod rate_limit;
pub mod sensitive;

pub use auth::{AuthError, AuthGate};
pub use rate_limit::{LimitScope, RateLimitDecision, RateLimiter};
pub use sensitive::Sensitive;
