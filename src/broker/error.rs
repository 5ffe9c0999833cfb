// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Errors raised while talking to the registry broker

use serde_json::Value;
use thiserror::Error;

/// Errors returned by a [`BrokerTransport`](super::BrokerTransport)
///
/// Nothing here is retried automatically; callers decide.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Broker answered with a non-2xx status
    #[error("Broker API error: {status} - {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the body
        message: String,
        /// Parsed JSON body, when the broker sent one
        body: Option<Value>,
    },

    /// Request never produced a response (connect, TLS, timeout)
    #[error("Broker transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode broker response: {0}")]
    Decode(String),

    /// Session unknown to the broker
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// Session that was looked up
        session_id: String,
    },

    /// Broker rejected the request as invalid
    #[error("Invalid broker request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected
        reason: String,
    },
}

impl BrokerError {
    /// HTTP status, for errors that carry one
    pub fn status(&self) -> Option<u16> {
        match self {
            BrokerError::Http { status, .. } => Some(*status),
            BrokerError::SessionNotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BrokerError::Decode(err.to_string())
        } else {
            BrokerError::Transport(err.to_string())
        }
    }
}
