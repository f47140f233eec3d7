//! Versioned at-rest encryption for signup records.
//!
//! # Format
//! ```text
//! version 1: {"payload": b64(nonce[12] || ciphertext || tag[16]), "version": 1, "storedAt": ...}
//! version 0: the record JSON itself (no key configured when it was written)
//! ```
//!
//! # Design Decisions
//! - AES-256-GCM: tampering or a wrong key fails tag verification
//! - Fresh random nonce per record
//! - The version number is bound into the tag as associated data

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;

/// Current envelope format.
pub const ENVELOPE_VERSION: u32 = 1;
/// Records stored without an envelope.
pub const LEGACY_PLAINTEXT_VERSION: u32 = 0;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted wrapper persisted in place of the record JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Opaque: base64 of nonce, ciphertext and authentication tag.
    pub payload: String,
    pub version: u32,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption key must be base64 encoding exactly {KEY_LEN} bytes")]
    MalformedKey,

    #[error("cipher failure")]
    Cipher,

    #[error("record could not be serialized: {0}")]
    Encoding(String),
}

#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("encryption key must be base64 encoding exactly {KEY_LEN} bytes")]
    MalformedKey,

    #[error("record is encrypted but no key is configured")]
    MissingKey,

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("authentication tag verification failed")]
    Authentication,
}

impl DecryptionError {
    /// Low-cardinality label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DecryptionError::MalformedKey => "malformed_key",
            DecryptionError::MissingKey => "missing_key",
            DecryptionError::UnsupportedVersion(_) => "unsupported_version",
            DecryptionError::Malformed(_) => "malformed",
            DecryptionError::Authentication => "authentication",
        }
    }
}

/// Decode a base64 key and check its length.
pub fn parse_key(raw: &str) -> Result<[u8; KEY_LEN], EncryptionError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|_| EncryptionError::MalformedKey)?;
    bytes.try_into().map_err(|_| EncryptionError::MalformedKey)
}

fn cipher_for(raw_key: &str) -> Result<Aes256Gcm, EncryptionError> {
    let key = parse_key(raw_key)?;
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)))
}

fn aad(version: u32) -> [u8; 4] {
    version.to_be_bytes()
}

/// Seal `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &str) -> Result<EncryptedEnvelope, EncryptionError> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let aad = aad(ENVELOPE_VERSION);
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| EncryptionError::Cipher)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(EncryptedEnvelope {
        payload: base64::engine::general_purpose::STANDARD.encode(sealed),
        version: ENVELOPE_VERSION,
        stored_at: Utc::now(),
    })
}

/// Open an envelope sealed by [`encrypt`].
pub fn decrypt(envelope: &EncryptedEnvelope, key: &str) -> Result<Vec<u8>, DecryptionError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(DecryptionError::UnsupportedVersion(envelope.version));
    }
    let cipher = cipher_for(key).map_err(|_| DecryptionError::MalformedKey)?;

    let sealed = base64::engine::general_purpose::STANDARD
        .decode(&envelope.payload)
        .map_err(|e| DecryptionError::Malformed(e.to_string()))?;
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(DecryptionError::Malformed(format!(
            "payload too short ({} bytes)",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    let aad = aad(envelope.version);
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| DecryptionError::Authentication)
}

/// Process-wide codec: encrypts when a key is configured, otherwise passes
/// record JSON through and says so loudly.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    key: Option<String>,
}

impl EnvelopeCodec {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    /// True when records are written without encryption.
    pub fn is_plaintext(&self) -> bool {
        self.key.is_none()
    }

    /// Bytes to persist for a serialized record.
    pub fn encode(&self, record_json: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let Some(key) = &self.key else {
            tracing::warn!(
                version = LEGACY_PLAINTEXT_VERSION,
                "No encryption key configured; storing signup record as plaintext"
            );
            metrics::record_plaintext_write();
            return Ok(record_json.to_vec());
        };

        let envelope = encrypt(record_json, key)?;
        serde_json::to_vec(&envelope).map_err(|e| EncryptionError::Encoding(e.to_string()))
    }

    /// Recover record JSON from stored bytes, accepting legacy plaintext.
    pub fn decode(&self, stored: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        let value: serde_json::Value =
            serde_json::from_slice(stored).map_err(|e| DecryptionError::Malformed(e.to_string()))?;

        let is_envelope = value
            .as_object()
            .is_some_and(|o| o.contains_key("payload") && o.contains_key("version"));
        if !is_envelope {
            return Ok(stored.to_vec());
        }

        let envelope: EncryptedEnvelope =
            serde_json::from_value(value).map_err(|e| DecryptionError::Malformed(e.to_string()))?;
        let key = self.key.as_deref().ok_or(DecryptionError::MissingKey)?;
        decrypt(&envelope, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const KEY_B: &str = "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=";

    #[test]
    fn round_trip() {
        let record = br#"{"email":"ada@example.com","fullName":"Ada"}"#;
        let envelope = encrypt(record, KEY_A).unwrap();
        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert!(!envelope.payload.contains("ada"));
        assert_eq!(decrypt(&envelope, KEY_A).unwrap(), record.to_vec());
    }

    #[test]
    fn wrong_key_fails_loudly() {
        let envelope = encrypt(b"{}", KEY_A).unwrap();
        assert!(matches!(
            decrypt(&envelope, KEY_B),
            Err(DecryptionError::Authentication)
        ));
    }

    #[test]
    fn tampered_payload_fails() {
        let mut envelope = encrypt(b"{\"a\":1}", KEY_A).unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&envelope.payload)
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        envelope.payload = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(matches!(
            decrypt(&envelope, KEY_A),
            Err(DecryptionError::Authentication)
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut envelope = encrypt(b"{}", KEY_A).unwrap();
        envelope.version = 7;
        assert!(matches!(
            decrypt(&envelope, KEY_A),
            Err(DecryptionError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn malformed_key_is_an_encryption_error() {
        assert!(matches!(encrypt(b"{}", "not base64!"), Err(EncryptionError::MalformedKey)));
        assert!(matches!(encrypt(b"{}", "c2hvcnQ="), Err(EncryptionError::MalformedKey)));
    }

    #[test]
    fn codec_without_key_passes_plaintext_through() {
        let codec = EnvelopeCodec::new(None);
        assert!(codec.is_plaintext());
        let stored = codec.encode(b"{\"email\":\"a@b.co\"}").unwrap();
        assert_eq!(stored, b"{\"email\":\"a@b.co\"}".to_vec());
        assert_eq!(codec.decode(&stored).unwrap(), stored);
    }

    #[test]
    fn codec_reads_legacy_plaintext_with_a_key() {
        let codec = EnvelopeCodec::new(Some(KEY_A.to_string()));
        let legacy = b"{\"email\":\"a@b.co\"}";
        assert_eq!(codec.decode(legacy).unwrap(), legacy.to_vec());
    }

    #[test]
    fn codec_round_trip_and_missing_key() {
        let codec = EnvelopeCodec::new(Some(KEY_A.to_string()));
        let stored = codec.encode(b"{\"x\":true}").unwrap();
        assert_eq!(codec.decode(&stored).unwrap(), b"{\"x\":true}".to_vec());

        let keyless = EnvelopeCodec::new(None);
        assert!(matches!(keyless.decode(&stored), Err(DecryptionError::MissingKey)));
    }

    #[test]
    fn codec_rejects_non_json() {
        let codec = EnvelopeCodec::new(Some(KEY_A.to_string()));
        assert!(matches!(codec.decode(b"\x00\x01"), Err(DecryptionError::Malformed(_))));
    }
}
