//! Service-wide error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::privacy::{DecryptionError, EncryptionError};
use crate::security::{AuthError, LimitScope};
use crate::store::StoreError;

/// Public message for malformed or suspicious input. Deliberately vague.
pub const INVALID_REQUEST: &str = "Invalid request";
pub const EMAIL_REQUIRED: &str = "Valid email is required";
pub const CONSENT_REQUIRED: &str = "Consent is required";
pub const INVALID_CURSOR: &str = "Invalid cursor";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input shape. `message` is safe to show the caller.
    #[error("validation failed on {field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("rate limited on {scope} scope, retry after {retry_after:?}")]
    RateLimited {
        scope: LimitScope,
        retry_after: Duration,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("admin access not configured")]
    NotConfigured,

    #[error("encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("decryption failed: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("storage failed: {0}")]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub fn invalid_request(field: &'static str) -> Self {
        ServiceError::Validation {
            field,
            message: INVALID_REQUEST,
        }
    }

    pub fn invalid_email(field: &'static str) -> Self {
        ServiceError::Validation {
            field,
            message: EMAIL_REQUIRED,
        }
    }

    pub fn consent_required() -> Self {
        ServiceError::Validation {
            field: "consentToContact",
            message: CONSENT_REQUIRED,
        }
    }

    /// Whether the caller can fix the problem; internal failures are masked.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation { .. }
                | ServiceError::RateLimited { .. }
                | ServiceError::Unauthorized
                | ServiceError::NotConfigured
        )
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => ServiceError::Unauthorized,
            AuthError::NotConfigured => ServiceError::NotConfigured,
        }
    }
}
