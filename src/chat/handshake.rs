// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption Handshake Coordinator
//!
//! Exchanges ephemeral public keys with the peer through the broker. There is
//! no direct link between the parties: each side publishes its key for its
//! role, then polls the broker's status endpoint until the record shows the
//! peer's key and `status == complete`.
//!
//! ```text
//! not started → key submitted → polling → complete
//!                                       ↘ timed out | aborted
//! ```
//!
//! Submission order does not matter; the broker record is the single source
//! of truth and both sides converge by polling. A side whose own key is
//! replaced in the record before it completes fails with
//! [`ChatError::HandshakeSuperseded`] instead of deriving. The wait is a bounded loop on
//! the caller's task: no background timers are spawned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ChatError;
use crate::broker::{
    BrokerError, BrokerTransport, EncryptionHandshakeRecord, HandshakeRole, HandshakeSubmission,
    RecipientIdentity, SessionEncryptionSummary,
};
use crate::config::HandshakeConfig;
use crate::crypto::{decode_public_key_hex, EphemeralKeyPair, SharedSecret};

/// Result of a completed handshake
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub role: HandshakeRole,
    pub shared_secret: SharedSecret,
    /// Final (complete) broker record
    pub record: EncryptionHandshakeRecord,
    /// Last summary observed, with `handshake` set to the final record
    pub summary: SessionEncryptionSummary,
    /// Our published key, hex
    pub local_public_key: String,
}

/// Sleep for `duration` unless `cancel` fires first
///
/// Returns `false` when cancelled; the remaining interval is abandoned.
pub async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Drives the requester and responder handshake tracks
pub struct HandshakeCoordinator {
    broker: Arc<dyn BrokerTransport>,
    config: HandshakeConfig,
}

impl HandshakeCoordinator {
    pub fn new(broker: Arc<dyn BrokerTransport>, config: HandshakeConfig) -> Self {
        Self { broker, config }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Requester track
    ///
    /// `summary` is the one returned when the session was created; it must
    /// already report encryption as enabled.
    pub async fn request(
        &self,
        session_id: &str,
        summary: SessionEncryptionSummary,
        identity: Option<&RecipientIdentity>,
        cancel: &CancellationToken,
    ) -> Result<HandshakeOutcome, ChatError> {
        if !summary.enabled {
            return Err(ChatError::EncryptionUnavailable {
                session_id: session_id.to_string(),
                summary: Box::new(summary),
            });
        }
        self.run(HandshakeRole::Requester, session_id, summary, identity, cancel)
            .await
    }

    /// Responder track
    ///
    /// Fetches the current summary first and fails immediately with
    /// `EncryptionUnavailable` when the session is not encrypted.
    pub async fn respond(
        &self,
        session_id: &str,
        identity: Option<&RecipientIdentity>,
        cancel: &CancellationToken,
    ) -> Result<HandshakeOutcome, ChatError> {
        let role = HandshakeRole::Responder;
        let summary = self
            .abortable(session_id, role, cancel, self.broker.get_encryption_status(session_id))
            .await?;

        if !summary.enabled {
            return Err(ChatError::EncryptionUnavailable {
                session_id: session_id.to_string(),
                summary: Box::new(summary),
            });
        }
        self.run(role, session_id, summary, identity, cancel).await
    }

    /// Shared core: publish our key, then poll until the peer's key shows up
    async fn run(
        &self,
        role: HandshakeRole,
        session_id: &str,
        summary: SessionEncryptionSummary,
        identity: Option<&RecipientIdentity>,
        cancel: &CancellationToken,
    ) -> Result<HandshakeOutcome, ChatError> {
        let key_pair = EphemeralKeyPair::generate();
        let local_public_key = key_pair.public_key_hex();

        let submission = HandshakeSubmission {
            role,
            ephemeral_public_key: local_public_key.clone(),
            identity: identity.cloned().unwrap_or_default(),
        };

        info!(
            session_id = %session_id,
            role = %role,
            public_key = %local_public_key,
            "Submitting encryption handshake"
        );

        let mut record = self
            .abortable(
                session_id,
                role,
                cancel,
                self.broker.submit_handshake(session_id, &submission),
            )
            .await?;
        let mut last_summary = summary;
        last_summary.handshake = Some(record.clone());

        let started = Instant::now();
        let poll_interval = self.config.poll_interval();
        let timeout = self.config.timeout();
        let mut polls = 0u32;

        loop {
            // A different key under our role means another client took the slot;
            // deriving now would give a secret the peer does not hold
            let superseded = match record.public_key(role) {
                Some(key) => !same_key(key, &local_public_key),
                None => record.is_complete(),
            };
            if superseded {
                warn!(
                    session_id = %session_id,
                    role = %role,
                    polls,
                    "Encryption handshake key replaced by another participant"
                );
                return Err(ChatError::HandshakeSuperseded {
                    session_id: session_id.to_string(),
                    role,
                    last_summary: Box::new(last_summary),
                });
            }

            if let Some(peer_key) = record.peer_key_when_complete(role) {
                let peer_bytes = decode_public_key_hex(peer_key)?;
                let shared_secret = key_pair.derive_shared_secret(&peer_bytes)?;

                info!(
                    session_id = %session_id,
                    role = %role,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Encryption handshake complete"
                );

                return Ok(HandshakeOutcome {
                    role,
                    shared_secret,
                    record,
                    summary: last_summary,
                    local_public_key,
                });
            }

            let waited = started.elapsed();
            if polls > 0 && waited >= timeout {
                warn!(
                    session_id = %session_id,
                    role = %role,
                    polls,
                    timeout_ms = timeout.as_millis() as u64,
                    "Encryption handshake timed out waiting for peer"
                );
                return Err(ChatError::HandshakeTimeout {
                    session_id: session_id.to_string(),
                    role,
                    waited,
                    last_summary: Box::new(last_summary),
                });
            }

            if !cancellable_sleep(poll_interval, cancel).await {
                return Err(self.aborted(session_id, role));
            }

            let summary = self
                .abortable(session_id, role, cancel, self.broker.get_encryption_status(session_id))
                .await?;
            polls += 1;

            record = summary.handshake.clone().unwrap_or_default();
            last_summary = summary;

            debug!(
                session_id = %session_id,
                role = %role,
                polls,
                status = ?record.status,
                peer_submitted = record.public_key(role.peer()).is_some(),
                "Polled encryption handshake status"
            );
        }
    }

    /// Run a broker call, bailing out with `Aborted` if `cancel` fires first
    async fn abortable<T, F>(
        &self,
        session_id: &str,
        role: HandshakeRole,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, ChatError>
    where
        F: Future<Output = Result<T, BrokerError>>,
    {
        if cancel.is_cancelled() {
            return Err(self.aborted(session_id, role));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.aborted(session_id, role)),
            result = call => result.map_err(ChatError::from),
        }
    }

    fn aborted(&self, session_id: &str, role: HandshakeRole) -> ChatError {
        info!(session_id = %session_id, role = %role, "Encryption handshake aborted");
        ChatError::Aborted {
            session_id: session_id.to_string(),
            role,
        }
    }
}

/// Hex keys compare case-insensitively, with or without a `0x` prefix
fn same_key(a: &str, b: &str) -> bool {
    let strip: fn(&str) -> &str = |key| key.trim().trim_start_matches("0x");
    strip(a).eq_ignore_ascii_case(strip(b))
}
