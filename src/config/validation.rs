//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits, windows and timeouts > 0, page sizes)
//! - Check addresses parse and the encryption key is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ServiceConfig, StorageBackend, WindowLimit};
use crate::privacy::envelope::parse_key;
use crate::privacy::identity::{MAX_HASH_LEN, MIN_HASH_LEN};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.store_call_ms == 0 {
        errors.push(ValidationError::new("timeouts.store_call_ms", "must be > 0"));
    }

    check_window(&mut errors, "rate_limit.ip", &config.rate_limit.ip);
    check_window(&mut errors, "rate_limit.email", &config.rate_limit.email);

    let admin = &config.admin;
    if admin.max_page_size == 0 {
        errors.push(ValidationError::new("admin.max_page_size", "must be > 0"));
    }
    if admin.default_page_size == 0 || admin.default_page_size > admin.max_page_size {
        errors.push(ValidationError::new(
            "admin.default_page_size",
            format!("must be between 1 and max_page_size ({})", admin.max_page_size),
        ));
    }
    if let Some(token) = &admin.token {
        if token.expose().trim().is_empty() {
            errors.push(ValidationError::new("admin.token", "must not be blank when set"));
        }
    }

    if let Some(key) = &config.encryption.key {
        if let Err(e) = parse_key(key.expose()) {
            errors.push(ValidationError::new("encryption.key", e.to_string()));
        }
    }

    let storage = &config.storage;
    if !(MIN_HASH_LEN..=MAX_HASH_LEN).contains(&storage.hash_prefix_len) {
        errors.push(ValidationError::new(
            "storage.hash_prefix_len",
            format!("must be between {MIN_HASH_LEN} and {MAX_HASH_LEN}"),
        ));
    }
    if storage.backend == StorageBackend::Filesystem && storage.root_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new(
            "storage.root_dir",
            "required for the filesystem backend",
        ));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", obs.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_window(errors: &mut Vec<ValidationError>, field: &str, window: &WindowLimit) {
    if window.limit == 0 {
        errors.push(ValidationError::new(format!("{field}.limit"), "must be > 0"));
    }
    if window.window_secs == 0 {
        errors.push(ValidationError::new(format!("{field}.window_secs"), "must be > 0"));
    }
}
