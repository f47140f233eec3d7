//! Signup records and inbound form validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::privacy::normalize_email;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_FULL_NAME_LEN: usize = 120;
pub const MAX_MAIN_INTEREST_LEN: usize = 1000;
pub const MAX_POLICY_VERSION_LEN: usize = 32;

/// An accepted waitlist signup. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRecord {
    pub email: String,
    pub full_name: String,
    pub main_interest: String,
    pub policy_version: String,
    pub consent_to_contact: bool,
    pub consent_timestamp: DateTime<Utc>,
    pub signup_date: DateTime<Utc>,
}

/// Raw submission body. Every field is optional here so presence is checked
/// by [`SignupForm::validate`] rather than surfacing serde errors.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub main_interest: Option<String>,
    pub policy_version: Option<String>,
    pub consent_to_contact: Option<bool>,
    /// Honeypot. Hidden from people, filled in by bots.
    pub company: Option<String>,
}

/// A form that passed shape checks. Consent is still unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub email: String,
    pub full_name: String,
    pub main_interest: String,
    pub policy_version: String,
    pub consent_to_contact: Option<bool>,
}

/// Basic `local@domain.tld` shape check on an already-normalized address.
pub fn is_valid_email(email: &str) -> bool {
    let len = email.chars().count();
    if len == 0 || len > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn required_text(
    value: Option<&str>,
    max_len: usize,
    field: &'static str,
) -> Result<String, ServiceError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() || value.chars().count() > max_len {
        return Err(ServiceError::invalid_request(field));
    }
    Ok(value.to_string())
}

impl SignupForm {
    pub fn honeypot_tripped(&self) -> bool {
        self.company
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }

    /// Presence and length checks for every field, then the email format check.
    pub fn validate(&self) -> Result<ValidSignup, ServiceError> {
        let full_name = required_text(self.full_name.as_deref(), MAX_FULL_NAME_LEN, "fullName")?;
        let main_interest = required_text(
            self.main_interest.as_deref(),
            MAX_MAIN_INTEREST_LEN,
            "mainInterest",
        )?;
        let policy_version = required_text(
            self.policy_version.as_deref(),
            MAX_POLICY_VERSION_LEN,
            "policyVersion",
        )?;

        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        if !is_valid_email(&email) {
            return Err(ServiceError::invalid_email("email"));
        }

        Ok(ValidSignup {
            email,
            full_name,
            main_interest,
            policy_version,
            consent_to_contact: self.consent_to_contact,
        })
    }
}

impl SignupRecord {
    /// Stamp a validated, consented signup with server-side timestamps.
    pub fn accept(signup: ValidSignup, now: DateTime<Utc>) -> Self {
        Self {
            email: signup.email,
            full_name: signup.full_name,
            main_interest: signup.main_interest,
            policy_version: signup.policy_version,
            consent_to_contact: true,
            consent_timestamp: now,
            signup_date: now,
        }
    }
}
