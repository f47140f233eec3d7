//! Waitlist signup pipeline.
//!
//! # Data Flow
//! ```text
//! POST /api/waitlist
//!     → intake.rs (honeypot, validation, ip/email limits, consent,
//!                  encode, write-once put)
//!
//! GET /api/admin/signups (after AuthGate)
//!     → retrieval.rs (prefix listing, concurrent fetch + decode,
//!                     drop failures, sort newest first)
//! ```

pub mod intake;
pub mod model;
pub mod retrieval;

/// Namespace every signup record lives under.
pub const SIGNUP_PREFIX: &str = "signups/";

pub use intake::{SignupAck, SignupIntake};
pub use model::{SignupForm, SignupRecord};
pub use retrieval::{AdminRetrieval, ListQuery, SignupPage};
