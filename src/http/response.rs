//! Error → HTTP response mapping.
//!
//! # Design Decisions
//! - Client errors carry just enough structure to act on (field, retry-after)
//! - Internal errors are logged in full and rendered as one opaque message
//! - The generic "Invalid request" never names a field, so a tripped honeypot
//!   looks exactly like a malformed body

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{ServiceError, INVALID_REQUEST};

pub const TRY_LATER: &str = "Something went wrong. Please try again later.";
pub const TOO_MANY_REQUESTS: &str = "Too many requests";
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const NOT_CONFIGURED: &str = "Admin access is not configured";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn message(error: &'static str) -> Self {
        Self {
            error,
            field: None,
            retry_after: None,
        }
    }
}

/// Whole seconds, rounded up, never zero.
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation { field, message } => {
                let body = ErrorBody {
                    error: message,
                    field: (message != INVALID_REQUEST).then_some(field),
                    retry_after: None,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ServiceError::RateLimited { retry_after, .. } => {
                let secs = retry_after_secs(retry_after);
                let body = ErrorBody {
                    error: TOO_MANY_REQUESTS,
                    field: None,
                    retry_after: Some(secs),
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            ServiceError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::message(UNAUTHORIZED))).into_response()
            }
            ServiceError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody::message(NOT_CONFIGURED)),
            )
                .into_response(),
            internal @ (ServiceError::Encryption(_)
            | ServiceError::Decryption(_)
            | ServiceError::Storage(_)) => {
                tracing::error!(error = %internal, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::message(TRY_LATER)),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::LimitScope;
    use crate::store::StoreError;

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(3)), 3);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServiceError::invalid_request("body"), StatusCode::BAD_REQUEST),
            (
                ServiceError::RateLimited {
                    scope: LimitScope::Ip,
                    retry_after: Duration::from_secs(9),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::NotConfigured, StatusCode::SERVICE_UNAVAILABLE),
            (
                ServiceError::Storage(StoreError::Timeout(5)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn rate_limited_sets_header() {
        let response = ServiceError::RateLimited {
            scope: LimitScope::Email,
            retry_after: Duration::from_millis(4200),
        }
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }
}
