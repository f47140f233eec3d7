//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::security::Sensitive;

/// Overrides the admin token.
pub const ENV_ADMIN_TOKEN: &str = "WAITLIST_ADMIN_TOKEN";
/// Overrides the record encryption key.
pub const ENV_ENCRYPTION_KEY: &str = "WAITLIST_ENCRYPTION_KEY";
/// Overrides the listener bind address.
pub const ENV_BIND_ADDRESS: &str = "WAITLIST_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;
    finalize(config, |name| std::env::var(name).ok())
}

/// Build configuration from defaults plus environment overrides.
pub fn load_from_env() -> Result<ServiceConfig, ConfigError> {
    finalize(ServiceConfig::default(), |name| std::env::var(name).ok())
}

/// Apply overrides from `lookup` and validate. Secrets are expected to arrive
/// this way rather than sitting in the config file.
pub fn finalize<F>(mut config: ServiceConfig, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ENV_ADMIN_TOKEN).filter(|v| !v.is_empty()) {
        config.admin.token = Some(Sensitive(token));
    }
    if let Some(key) = lookup(ENV_ENCRYPTION_KEY).filter(|v| !v.is_empty()) {
        config.encryption.key = Some(Sensitive(key));
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS).filter(|v| !v.is_empty()) {
        config.listener.bind_address = addr;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
