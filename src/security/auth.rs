//! Admin token verification.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::security::Sensitive;

/// Fallback header for clients that cannot set `Authorization`.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Caller sent no token or the wrong one.
    #[error("missing or invalid admin token")]
    Unauthorized,

    /// No admin token is configured, so nobody can authenticate.
    #[error("admin token not configured")]
    NotConfigured,
}

/// Pull the caller's token: `Authorization: Bearer` first, then `X-Admin-Token`.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

/// Compare tokens in time that depends only on their lengths.
pub fn verify(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Gate in front of every admin action.
#[derive(Debug, Clone)]
pub struct AuthGate {
    expected: Option<Sensitive<String>>,
}

impl AuthGate {
    pub fn new(expected: Option<Sensitive<String>>) -> Self {
        Self { expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn authorize(&self, provided: Option<&str>) -> Result<(), AuthError> {
        let expected = self.expected.as_ref().ok_or(AuthError::NotConfigured)?;
        match provided {
            Some(token) if verify(token, expected.expose()) => Ok(()),
            _ => Err(AuthError::Unauthorized),
        }
    }

    pub fn authorize_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        self.authorize(extract_token(headers))
    }
}
