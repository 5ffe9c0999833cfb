// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error types for the key material provider and the envelope cipher.
//!
//! ## Error Variants
//!
//! - **InvalidKey**: Key has the wrong size, is not a curve point, or is not valid hex
//! - **InvalidNonce**: Nonce is not the 12 bytes AES-256-GCM requires
//! - **InvalidPayload**: Envelope field is missing, malformed base64, or too short
//! - **DecryptionFailed**: AEAD tag mismatch (wrong key, tampered ciphertext, AAD mismatch)
//! - **EncryptionFailed**: AEAD encryption rejected its input
//! - **KeyDerivationFailed**: ECDH produced an unusable point
//! - **NoEnvelope**: History entry carries no cipher envelope at all
//!
//! `NoEnvelope` is kept apart from `DecryptionFailed` so callers can tell
//! "nothing to decrypt" from "could not decrypt", even though the history path
//! maps both to a missing plaintext.

use std::fmt;

/// Error type for all cryptographic operations in this crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid cryptographic key
    InvalidKey {
        /// Type of key that failed (e.g., "ephemeral_public_key", "local_private_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid nonce size
    InvalidNonce {
        /// Expected nonce size (always 12 for AES-256-GCM)
        expected_size: usize,
        /// Actual nonce size provided
        actual_size: usize,
    },

    /// Envelope field validation failed
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// AEAD decryption failed
    DecryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// AEAD encryption failed
    EncryptionFailed {
        /// Specific failure reason
        reason: String,
    },

    /// ECDH key derivation failed
    KeyDerivationFailed {
        /// Which key derivation operation failed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// The entry has no cipher envelope to decrypt
    NoEnvelope,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::InvalidNonce {
                expected_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Invalid nonce size: expected {} bytes, got {} bytes",
                    expected_size, actual_size
                )
            }
            CryptoError::InvalidPayload { field, reason } => {
                write!(f, "Invalid payload field '{}': {}", field, reason)
            }
            CryptoError::DecryptionFailed { operation, reason } => {
                write!(f, "Decryption failed during {}: {}", operation, reason)
            }
            CryptoError::EncryptionFailed { reason } => {
                write!(f, "Encryption failed: {}", reason)
            }
            CryptoError::KeyDerivationFailed { operation, reason } => {
                write!(f, "Key derivation failed during {}: {}", operation, reason)
            }
            CryptoError::NoEnvelope => write!(f, "No cipher envelope present"),
        }
    }
}

impl std::error::Error for CryptoError {}
