//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize, apply WAITLIST_* env overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all components
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup and never reloaded
//! - All fields have defaults to allow minimal configs
//! - Secrets are wrapped in `Sensitive` so they never reach logs

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    AdminConfig, AuditConfig, EncryptionConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, ServiceConfig, StorageBackend, StorageConfig, TimeoutConfig,
    WindowLimit,
};
