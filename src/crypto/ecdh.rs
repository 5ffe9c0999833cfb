// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Key Material
//!
//! Generates the ephemeral secp256k1 key pairs used for one handshake and
//! derives the session's symmetric secret from the local private key and the
//! peer's published public key.
//!
//! The shared secret is `SHA-256(compressed(local_scalar * peer_point))`, so
//! both parties land on the same 32 bytes without ever transmitting them.

use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

use super::error::CryptoError;

/// Size of a secp256k1 private scalar
pub const PRIVATE_KEY_LEN: usize = 32;

/// Size of a compressed secp256k1 public key
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

/// Size of an uncompressed secp256k1 public key
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

/// Size of the derived symmetric secret
pub const SHARED_SECRET_LEN: usize = 32;

/// Symmetric key shared by both parties of one session.
///
/// Held in memory only; the bytes are wiped when the last copy is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, failing on anything other than 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SHARED_SECRET_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKey {
                key_type: "shared_secret".to_string(),
                reason: format!(
                    "expected {} bytes, got {}",
                    SHARED_SECRET_LEN,
                    bytes.len()
                ),
            })?;
        Ok(Self(array))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Ephemeral secp256k1 key pair generated for a single handshake
///
/// Never persisted and never reused across sessions.
#[derive(Clone)]
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair from the operating system CSPRNG
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a key pair from a 32-byte private scalar
    pub fn from_private_key(private_key: &[u8]) -> Result<Self, CryptoError> {
        let secret = parse_private_key(private_key)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Private scalar bytes
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        let mut bytes = [0u8; PRIVATE_KEY_LEN];
        bytes.copy_from_slice(&self.secret.to_bytes());
        bytes
    }

    /// Compressed SEC1 encoding of the public key (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Hex encoding of the compressed public key, as published to the broker
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Derive the session secret against the peer's public key
    pub fn derive_shared_secret(&self, peer_public_key: &[u8]) -> Result<SharedSecret, CryptoError> {
        let peer = parse_public_key(peer_public_key)?;
        shared_secret_from_parts(&self.secret, &peer)
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Generate a new ephemeral key pair
pub fn generate_ephemeral_key_pair() -> EphemeralKeyPair {
    EphemeralKeyPair::generate()
}

/// Derive the 32-byte session secret using ECDH
///
/// # Arguments
///
/// * `local_private_key` - Our ephemeral private scalar (32 bytes)
/// * `peer_public_key` - Peer's ephemeral public key (33 bytes compressed or 65 bytes uncompressed)
///
/// # Errors
///
/// Fails with `InvalidKey` before doing any work if either encoding is malformed.
pub fn derive_shared_secret(
    local_private_key: &[u8],
    peer_public_key: &[u8],
) -> Result<SharedSecret, CryptoError> {
    let secret = parse_private_key(local_private_key)?;
    let peer = parse_public_key(peer_public_key)?;
    shared_secret_from_parts(&secret, &peer)
}

/// Validate and parse a SEC1-encoded secp256k1 public key
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != COMPRESSED_PUBLIC_KEY_LEN && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKey {
            key_type: "ephemeral_public_key".to_string(),
            reason: format!(
                "expected {} or {} bytes, got {}",
                COMPRESSED_PUBLIC_KEY_LEN,
                UNCOMPRESSED_PUBLIC_KEY_LEN,
                bytes.len()
            ),
        });
    }

    PublicKey::from_sec1_bytes(bytes).map_err(|e| CryptoError::InvalidKey {
        key_type: "ephemeral_public_key".to_string(),
        reason: format!("not a valid curve point: {}", e),
    })
}

/// Decode a hex public key as published by the broker (optional `0x` prefix)
pub fn decode_public_key_hex(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = encoded.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(stripped).map_err(|e| CryptoError::InvalidKey {
        key_type: "ephemeral_public_key".to_string(),
        reason: format!("hex decode error: {}", e),
    })?;
    parse_public_key(&bytes)?;
    Ok(bytes)
}

fn parse_private_key(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(CryptoError::InvalidKey {
            key_type: "local_private_key".to_string(),
            reason: format!("expected {} bytes, got {}", PRIVATE_KEY_LEN, bytes.len()),
        });
    }

    SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey {
        key_type: "local_private_key".to_string(),
        reason: format!("scalar out of range: {}", e),
    })
}

fn shared_secret_from_parts(
    secret: &SecretKey,
    peer: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    let shared_point = (peer.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    let encoded = shared_point.to_encoded_point(true);

    if encoded.as_bytes().len() != COMPRESSED_PUBLIC_KEY_LEN {
        return Err(CryptoError::KeyDerivationFailed {
            operation: "ecdh".to_string(),
            reason: "shared point is the identity".to_string(),
        });
    }

    let digest = Sha256::digest(encoded.as_bytes());
    let mut key = [0u8; SHARED_SECRET_LEN];
    key.copy_from_slice(&digest);
    Ok(SharedSecret(key))
}
