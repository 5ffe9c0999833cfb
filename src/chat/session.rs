// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Lifecycle Manager
//!
//! `start_session` (initiator) and `accept_session` (responder) establish a
//! chat session, run the handshake when encryption is possible, and apply the
//! plaintext fallback policy:
//!
//! | preference  | encryption unavailable     | other handshake failure |
//! |-------------|----------------------------|-------------------------|
//! | `Required`  | error                      | error                   |
//! | `Preferred` | plaintext handle, same id  | error                   |
//! | `Disabled`  | never asks; plaintext      | n/a                     |
//!
//! Established secrets are registered in the client's
//! [`ConversationContextRegistry`] so later history fetches can decrypt
//! without the original handle.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::ChatError;
use super::handle::{ConversationHandle, DecryptedHistoryEntry};
use super::handshake::{HandshakeCoordinator, HandshakeOutcome};
use super::options::{
    AcceptSessionOptions, ChatTarget, EncryptionPreference, HandshakeOverrides,
    StartSessionOptions,
};
use crate::broker::{
    BrokerTransport, ChatHistoryEntry, CreateSessionRequest, HandshakeRole, HistoryQuery,
    HttpBroker, RecipientIdentity, SessionEncryptionSummary,
};
use crate::config::{BrokerConfig, HandshakeConfig};
use crate::crypto::{decrypt_envelope_opt, ConversationContext, ConversationContextRegistry};

/// Client for establishing broker-relayed chat sessions
///
/// One instance can establish many sessions concurrently; each session's
/// handshake state and secret are independent.
#[derive(Clone)]
pub struct EncryptedChatClient {
    broker: Arc<dyn BrokerTransport>,
    registry: ConversationContextRegistry,
    handshake: HandshakeConfig,
}

impl EncryptedChatClient {
    pub fn new(broker: Arc<dyn BrokerTransport>, handshake: HandshakeConfig) -> Self {
        Self {
            broker,
            registry: ConversationContextRegistry::new(),
            handshake,
        }
    }

    /// Client talking to the broker over HTTP
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let broker = HttpBroker::new(config)?;
        Ok(Self::new(Arc::new(broker), config.handshake))
    }

    pub fn registry(&self) -> &ConversationContextRegistry {
        &self.registry
    }

    pub fn broker(&self) -> &Arc<dyn BrokerTransport> {
        &self.broker
    }

    /// Open a new session with `options.target`
    pub async fn start_session(
        &self,
        options: StartSessionOptions,
    ) -> Result<ConversationHandle, ChatError> {
        let coordinator = self.coordinator(&options.handshake)?;
        let preference = options.preference;

        let (uaid, agent_url) = match &options.target {
            ChatTarget::Uaid(uaid) => (Some(uaid.clone()), None),
            ChatTarget::AgentUrl(url) => (None, Some(url.clone())),
        };
        if uaid.as_deref().or(agent_url.as_deref()).map_or(true, |t| t.trim().is_empty()) {
            return Err(ChatError::Configuration {
                reason: "chat target must not be empty".to_string(),
            });
        }

        let request = CreateSessionRequest {
            uaid,
            agent_url,
            auth: options.auth.clone(),
            history_ttl_seconds: options.history_ttl_seconds,
            encryption_requested: Some(preference != EncryptionPreference::Disabled),
            sender_uaid: options.identity.as_ref().and_then(|i| i.uaid.clone()),
        };

        let response = self.broker.create_session(&request).await?;
        let session_id = response.session_id;
        let summary = response.encryption.unwrap_or_default();

        info!(
            session_id = %session_id,
            encryption_enabled = summary.enabled,
            preference = ?preference,
            "Chat session created"
        );

        if preference == EncryptionPreference::Disabled {
            return Ok(ConversationHandle::plaintext(
                session_id,
                self.broker.clone(),
                Some(summary),
            ));
        }

        let cancel = cancel_token(&options.handshake);
        let result = coordinator
            .request(&session_id, summary, options.identity.as_ref(), &cancel)
            .await;

        match result {
            Ok(outcome) => {
                let fallback_uaid = options.target.uaid().map(str::to_string);
                self.establish(&session_id, outcome, options.identity, fallback_uaid)
                    .await
            }
            Err(err) => self.fallback(preference, err),
        }
    }

    /// Join an existing session as the responder
    pub async fn accept_session(
        &self,
        session_id: &str,
        options: AcceptSessionOptions,
    ) -> Result<ConversationHandle, ChatError> {
        if session_id.trim().is_empty() {
            return Err(ChatError::Configuration {
                reason: "session id must not be empty".to_string(),
            });
        }
        let coordinator = self.coordinator(&options.handshake)?;

        if options.preference == EncryptionPreference::Disabled {
            info!(session_id = %session_id, "Accepting chat session without encryption");
            return Ok(ConversationHandle::plaintext(
                session_id,
                self.broker.clone(),
                None,
            ));
        }

        let cancel = cancel_token(&options.handshake);
        let result = coordinator
            .respond(session_id, options.identity.as_ref(), &cancel)
            .await;

        match result {
            Ok(outcome) => {
                self.establish(session_id, outcome, options.identity, None)
                    .await
            }
            Err(err) => self.fallback(options.preference, err),
        }
    }

    /// End a session on the broker and forget its shared secret
    pub async fn end_session(&self, session_id: &str) -> Result<(), ChatError> {
        let result = self.broker.end_session(session_id).await;
        // Drop the secret even if the broker call failed; the session is over for us
        self.registry.remove(session_id).await;
        result?;
        info!(session_id = %session_id, "Chat session ended");
        Ok(())
    }

    /// Decrypt one entry using the registered context for `session_id`
    ///
    /// Without a registered context the entry is treated as plaintext:
    /// `content` is echoed unless the entry carries an envelope.
    pub async fn decrypt_history_entry(
        &self,
        session_id: &str,
        entry: &ChatHistoryEntry,
    ) -> Option<String> {
        match self.registry.shared_secret(session_id).await {
            Some(secret) => decrypt_envelope_opt(entry.cipher_envelope.as_ref(), &secret),
            None if entry.cipher_envelope.is_none() => Some(entry.content.clone()),
            None => None,
        }
    }

    /// History fetch that does not need the original handle
    pub async fn fetch_history(
        &self,
        session_id: &str,
        query: HistoryQuery,
    ) -> Result<Vec<DecryptedHistoryEntry>, ChatError> {
        let snapshot = self.broker.fetch_history(session_id, &query).await?;
        let secret = self.registry.shared_secret(session_id).await;

        Ok(snapshot
            .history
            .into_iter()
            .map(|entry| {
                let plaintext = match &secret {
                    Some(secret) => decrypt_envelope_opt(entry.cipher_envelope.as_ref(), secret),
                    None if entry.cipher_envelope.is_none() => Some(entry.content.clone()),
                    None => None,
                };
                DecryptedHistoryEntry { entry, plaintext }
            })
            .collect())
    }

    fn coordinator(&self, overrides: &HandshakeOverrides) -> Result<HandshakeCoordinator, ChatError> {
        let config = self
            .handshake
            .with_overrides(overrides.poll_interval, overrides.timeout);
        config.validate()?;
        Ok(HandshakeCoordinator::new(self.broker.clone(), config))
    }

    async fn establish(
        &self,
        session_id: &str,
        outcome: HandshakeOutcome,
        identity: Option<RecipientIdentity>,
        fallback_uaid: Option<String>,
    ) -> Result<ConversationHandle, ChatError> {
        let recipients = build_recipients(&outcome.summary, outcome.role, fallback_uaid);

        self.registry
            .register(ConversationContext {
                session_id: session_id.to_string(),
                shared_secret: outcome.shared_secret.clone(),
                identity,
            })
            .await;

        info!(
            session_id = %session_id,
            role = %outcome.role,
            recipients = recipients.len(),
            "Encrypted conversation established"
        );

        Ok(ConversationHandle::encrypted(
            session_id,
            self.broker.clone(),
            outcome.role,
            outcome.shared_secret,
            recipients,
            outcome.summary,
        ))
    }

    fn fallback(
        &self,
        preference: EncryptionPreference,
        err: ChatError,
    ) -> Result<ConversationHandle, ChatError> {
        match err {
            ChatError::EncryptionUnavailable {
                session_id,
                summary,
            } if preference == EncryptionPreference::Preferred => {
                warn!(
                    session_id = %session_id,
                    "Encryption unavailable, continuing in plaintext"
                );
                Ok(ConversationHandle::plaintext(
                    session_id,
                    self.broker.clone(),
                    Some(*summary),
                ))
            }
            err => Err(err),
        }
    }
}

impl std::fmt::Debug for EncryptedChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedChatClient")
            .field("broker", &self.broker.name())
            .field("handshake", &self.handshake)
            .finish()
    }
}

fn cancel_token(overrides: &HandshakeOverrides) -> CancellationToken {
    overrides.cancel.clone().unwrap_or_default()
}

/// Identities to record on outgoing envelopes
///
/// Uses the summary's usable identities; when none qualify, falls back to the
/// peer's UAID from the handshake record, then to the target UAID.
fn build_recipients(
    summary: &SessionEncryptionSummary,
    role: HandshakeRole,
    fallback_uaid: Option<String>,
) -> Vec<RecipientIdentity> {
    let recipients: Vec<RecipientIdentity> = [summary.requester.as_ref(), summary.responder.as_ref()]
        .into_iter()
        .flatten()
        .filter(|identity| identity.is_usable())
        .cloned()
        .collect();

    if !recipients.is_empty() {
        return recipients;
    }

    summary
        .handshake
        .as_ref()
        .and_then(|record| record.participant(role.peer()))
        .and_then(|peer| peer.identity.uaid.clone())
        .or(fallback_uaid)
        .filter(|uaid| !uaid.trim().is_empty())
        .map(|uaid| vec![RecipientIdentity::from_uaid(uaid)])
        .unwrap_or_default()
}
