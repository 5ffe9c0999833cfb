// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Errors surfaced by session establishment and conversation handles

use std::time::Duration;
use thiserror::Error;

use crate::broker::{BrokerError, HandshakeRole, SessionEncryptionSummary};
use crate::config::ConfigError;
use crate::crypto::CryptoError;

/// Caller-facing error taxonomy
///
/// Decryption failures on the history path never show up here; they become
/// a missing plaintext for the affected entry.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad local input, detected before any network call
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Malformed key material or envelope
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The session cannot be encrypted; carries the last summary for fallback
    #[error("Encryption unavailable for session {session_id}")]
    EncryptionUnavailable {
        session_id: String,
        summary: Box<SessionEncryptionSummary>,
    },

    /// Peer did not publish its key before the deadline
    #[error("Encryption handshake timed out for session {session_id} ({role}) after {waited:?}")]
    HandshakeTimeout {
        session_id: String,
        role: HandshakeRole,
        waited: Duration,
        last_summary: Box<SessionEncryptionSummary>,
    },

    /// Another party replaced our published key for this role
    #[error("Encryption handshake for session {session_id} ({role}) was taken over by another key")]
    HandshakeSuperseded {
        session_id: String,
        role: HandshakeRole,
        last_summary: Box<SessionEncryptionSummary>,
    },

    /// Caller cancelled while waiting
    #[error("Encryption handshake aborted for session {session_id} ({role})")]
    Aborted {
        session_id: String,
        role: HandshakeRole,
    },

    /// Broker rejected or failed a request
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// An encrypted handle was asked to send without a plaintext body
    #[error("Encrypted session {session_id} requires a plaintext message body")]
    MissingPlaintext { session_id: String },
}

impl ChatError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChatError::HandshakeTimeout { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ChatError::Aborted { .. })
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ChatError::HandshakeSuperseded { .. })
    }

    pub fn is_encryption_unavailable(&self) -> bool {
        matches!(self, ChatError::EncryptionUnavailable { .. })
    }

    /// Session the error relates to, when known
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ChatError::EncryptionUnavailable { session_id, .. }
            | ChatError::HandshakeTimeout { session_id, .. }
            | ChatError::HandshakeSuperseded { session_id, .. }
            | ChatError::Aborted { session_id, .. }
            | ChatError::MissingPlaintext { session_id } => Some(session_id.as_str()),
            ChatError::Broker(BrokerError::SessionNotFound { session_id }) => {
                Some(session_id.as_str())
            }
            _ => None,
        }
    }

    /// Last encryption summary seen before the failure
    pub fn summary(&self) -> Option<&SessionEncryptionSummary> {
        match self {
            ChatError::EncryptionUnavailable { summary, .. } => Some(&**summary),
            ChatError::HandshakeTimeout { last_summary, .. }
            | ChatError::HandshakeSuperseded { last_summary, .. } => Some(&**last_summary),
            _ => None,
        }
    }
}

impl From<ConfigError> for ChatError {
    fn from(err: ConfigError) -> Self {
        ChatError::Configuration {
            reason: err.to_string(),
        }
    }
}
