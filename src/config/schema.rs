//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::security::Sensitive;

/// Root configuration for the waitlist service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-scope signup rate limits.
    pub rate_limit: RateLimitConfig,

    /// Admin read path settings.
    pub admin: AdminConfig,

    /// At-rest encryption of signup records.
    pub encryption: EncryptionConfig,

    /// Record storage backend.
    pub storage: StorageConfig,

    /// Audit sink settings.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for each individual counter/object store call in milliseconds.
    pub store_call_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            store_call_ms: 2_000,
        }
    }
}

/// A single fixed-window limit.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct WindowLimit {
    /// Requests admitted per window.
    pub limit: u64,

    /// Window length in seconds.
    pub window_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Limit keyed by client network identity.
    pub ip: WindowLimit,

    /// Limit keyed by normalized email.
    pub email: WindowLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip: WindowLimit {
                limit: 10,
                window_secs: 3600,
            },
            email: WindowLimit {
                limit: 3,
                window_secs: 3600,
            },
        }
    }
}

/// Admin read path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Expected admin token. `None` means the admin surface is not configured.
    pub token: Option<Sensitive<String>>,

    /// Page size used when the caller omits or garbles `limit`.
    pub default_page_size: usize,

    /// Upper bound on `limit`.
    pub max_page_size: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token: None,
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

/// Encryption configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte AES-256-GCM key.
    ///
    /// WARNING: when unset, signup records are stored as plaintext JSON.
    pub key: Option<Sensitive<String>>,
}

/// Which object store implementation backs signup records.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Filesystem => "filesystem",
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Root directory for the filesystem backend.
    pub root_dir: PathBuf,

    /// Hex characters kept from the email digest in storage keys.
    pub hash_prefix_len: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root_dir: PathBuf::from("./data"),
            hash_prefix_len: crate::privacy::identity::DEFAULT_HASH_LEN,
        }
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// Append audit entries as JSON lines to this file. When unset, entries
    /// go to the `audit` tracing target.
    pub log_path: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Take the client address from the first `X-Forwarded-For` hop.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 16 * 1024,
            trust_forwarded_for: false,
        }
    }
}
