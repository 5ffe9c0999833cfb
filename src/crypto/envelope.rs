// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-256-GCM Cipher Envelopes
//!
//! Every encrypted chat turn travels as one self-describing envelope:
//!
//! ```text
//! {
//!   "algorithm": "aes-256-gcm",
//!   "ciphertext": base64(ciphertext | tag(16 bytes)),
//!   "nonce": base64(12 random bytes),
//!   "associatedData": base64(aad),          // defaults to the session id
//!   "keyLocator": { "sessionId": "...", "revision": 1 },
//!   "recipients": [{ "uaid": "...", "encryptedShare": "" }]
//! }
//! ```
//!
//! The associated data binds the tag to the session, so an envelope lifted
//! from one session fails authentication in any other. Recipients are
//! bookkeeping only: one shared secret per session, no per-recipient key wrap.

use aes_gcm::{
    aead::{Aead, AeadInPlace, KeyInit, Payload},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ecdh::SharedSecret;
use super::error::CryptoError;
use crate::broker::types::RecipientIdentity;

/// Algorithm tag written into every envelope
pub const ENVELOPE_ALGORITHM: &str = "aes-256-gcm";

/// AES-GCM nonce size (96 bits)
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size
pub const TAG_LEN: usize = 16;

/// Key revision; a session performs exactly one handshake
pub const KEY_REVISION: u32 = 1;

/// Locates the key an envelope was sealed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLocator {
    pub session_id: String,
    #[serde(default = "default_revision")]
    pub revision: u32,
}

fn default_revision() -> u32 {
    KEY_REVISION
}

/// Recipient entry with an empty key-share placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRecipient {
    #[serde(flatten)]
    pub identity: RecipientIdentity,
    #[serde(default)]
    pub encrypted_share: String,
}

impl From<RecipientIdentity> for EnvelopeRecipient {
    fn from(identity: RecipientIdentity) -> Self {
        Self {
            identity,
            encrypted_share: String::new(),
        }
    }
}

/// Authenticated envelope carrying one encrypted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherEnvelope {
    pub algorithm: String,
    /// base64(ciphertext | tag)
    pub ciphertext: String,
    /// base64 of the 12-byte nonce
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_data: Option<String>,
    pub key_locator: KeyLocator,
    #[serde(default)]
    pub recipients: Vec<EnvelopeRecipient>,
}

/// Encrypt a UTF-8 message into a fresh envelope
///
/// # Arguments
///
/// * `plaintext` - Message text
/// * `secret` - Session shared secret
/// * `session_id` - Session the envelope belongs to
/// * `associated_data` - AAD override; the session id is used when `None`
/// * `recipients` - Identities recorded on the envelope
///
/// A new random nonce is drawn for every call, so sealing the same text twice
/// yields two different envelopes.
pub fn encrypt_envelope(
    plaintext: &str,
    secret: &SharedSecret,
    session_id: &str,
    associated_data: Option<&[u8]>,
    recipients: &[RecipientIdentity],
) -> Result<CipherEnvelope, CryptoError> {
    if session_id.is_empty() {
        return Err(CryptoError::InvalidPayload {
            field: "keyLocator.sessionId".to_string(),
            reason: "session id must not be empty".to_string(),
        });
    }

    let aad = associated_data.unwrap_or(session_id.as_bytes());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(secret.as_bytes()).map_err(|e| {
        CryptoError::InvalidKey {
            key_type: "shared_secret".to_string(),
            reason: format!("failed to create AES-GCM cipher: {}", e),
        }
    })?;

    // Output is ciphertext with the 16-byte tag appended
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed {
            reason: e.to_string(),
        })?;

    Ok(CipherEnvelope {
        algorithm: ENVELOPE_ALGORITHM.to_string(),
        ciphertext: STANDARD.encode(&sealed),
        nonce: STANDARD.encode(nonce_bytes),
        associated_data: Some(STANDARD.encode(aad)),
        key_locator: KeyLocator {
            session_id: session_id.to_string(),
            revision: KEY_REVISION,
        },
        recipients: recipients
            .iter()
            .cloned()
            .map(EnvelopeRecipient::from)
            .collect(),
    })
}

/// Verify and decrypt an envelope
///
/// # Errors
///
/// - `InvalidPayload`: unknown algorithm, bad base64, ciphertext shorter than the tag
/// - `InvalidNonce`: nonce is not 12 bytes
/// - `DecryptionFailed`: tag mismatch (wrong key, tampered bytes, other session's AAD)
pub fn decrypt_envelope(
    envelope: &CipherEnvelope,
    secret: &SharedSecret,
) -> Result<String, CryptoError> {
    if !envelope.algorithm.eq_ignore_ascii_case(ENVELOPE_ALGORITHM) {
        return Err(CryptoError::InvalidPayload {
            field: "algorithm".to_string(),
            reason: format!("unsupported algorithm '{}'", envelope.algorithm),
        });
    }

    let nonce_bytes = decode_field("nonce", &envelope.nonce)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonce {
            expected_size: NONCE_LEN,
            actual_size: nonce_bytes.len(),
        });
    }

    let sealed = decode_field("ciphertext", &envelope.ciphertext)?;
    if sealed.len() < TAG_LEN {
        return Err(CryptoError::InvalidPayload {
            field: "ciphertext".to_string(),
            reason: format!(
                "expected at least {} bytes for the tag, got {}",
                TAG_LEN,
                sealed.len()
            ),
        });
    }

    let aad = match &envelope.associated_data {
        Some(encoded) => decode_field("associatedData", encoded)?,
        None => envelope.key_locator.session_id.as_bytes().to_vec(),
    };

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut buffer = ciphertext.to_vec();

    let cipher = Aes256Gcm::new_from_slice(secret.as_bytes()).map_err(|e| {
        CryptoError::InvalidKey {
            key_type: "shared_secret".to_string(),
            reason: format!("failed to create AES-GCM cipher: {}", e),
        }
    })?;

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce_bytes),
            &aad,
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::DecryptionFailed {
            operation: "envelope".to_string(),
            reason: "authentication tag mismatch (wrong key or corrupted data)".to_string(),
        })?;

    String::from_utf8(buffer).map_err(|e| CryptoError::DecryptionFailed {
        operation: "envelope".to_string(),
        reason: format!("decrypted data is not valid UTF-8: {}", e),
    })
}

/// Decrypt an entry's optional envelope
///
/// Fails with `NoEnvelope` when there is nothing to open, so callers can tell
/// a plaintext entry from one they cannot read.
pub fn open_envelope(
    envelope: Option<&CipherEnvelope>,
    secret: &SharedSecret,
) -> Result<String, CryptoError> {
    let envelope = envelope.ok_or(CryptoError::NoEnvelope)?;
    decrypt_envelope(envelope, secret)
}

/// Decrypt an optional envelope, collapsing every failure to `None`
///
/// History streams can mix entries from different handshakes, so one
/// unreadable entry must not abort the whole fetch.
pub fn decrypt_envelope_opt(
    envelope: Option<&CipherEnvelope>,
    secret: &SharedSecret,
) -> Option<String> {
    match open_envelope(envelope, secret) {
        Ok(plaintext) => Some(plaintext),
        Err(CryptoError::NoEnvelope) => None,
        Err(e) => {
            debug!(
                session_id = envelope.map(|env| env.key_locator.session_id.as_str()).unwrap_or_default(),
                error = %e,
                "Unable to decrypt history entry"
            );
            None
        }
    }
}

fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| CryptoError::InvalidPayload {
            field: field.to_string(),
            reason: format!("base64 decode error: {}", e),
        })
}
