// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Encryption Module
//!
//! Cryptographic primitives for broker-relayed two-party chat:
//!
//! - **ECDH**: Ephemeral-ephemeral key agreement on secp256k1, hashed with SHA-256
//! - **Envelope**: AES-256-GCM authenticated envelopes, AAD bound to the session
//! - **Context**: In-memory session -> shared secret registry
//!
//! ## Security Considerations
//!
//! - Ephemeral keys and shared secrets live in memory only, never persisted
//! - Nonces are drawn fresh from the OS CSPRNG for every envelope
//! - The broker relays envelopes but never sees the shared secret

pub mod context;
pub mod ecdh;
pub mod envelope;
pub mod error;

pub use context::{ConversationContext, ConversationContextRegistry};
pub use ecdh::{
    decode_public_key_hex, derive_shared_secret, generate_ephemeral_key_pair, parse_public_key,
    EphemeralKeyPair, SharedSecret,
};
pub use envelope::{
    decrypt_envelope, decrypt_envelope_opt, encrypt_envelope, open_envelope, CipherEnvelope,
    EnvelopeRecipient, KeyLocator, ENVELOPE_ALGORITHM,
};
pub use error::CryptoError;
