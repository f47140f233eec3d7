//! Privacy primitives for signup records.
//!
//! # Data Flow
//! ```text
//! email
//!     → identity.rs (normalize, truncated SHA-256) → storage key prefix
//! record JSON
//!     → envelope.rs (AES-256-GCM envelope, or plaintext when unkeyed) → object store
//! ```

pub mod envelope;
pub mod identity;

pub use envelope::{DecryptionError, EncryptedEnvelope, EncryptionError, EnvelopeCodec};
pub use identity::{normalize_email, IdentityHasher};
