// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process broker
//!
//! Implements [`BrokerTransport`] entirely in memory with the same merge rule
//! the real broker applies to handshake records: a role may publish its key
//! at any time, and the record flips to `complete` only once both roles have
//! published. Used by the test suites and for local demos; two clients sharing
//! one `InMemoryBroker` behave like two parties talking through the broker.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::BrokerError;
use super::transport::BrokerTransport;
use super::types::{
    ChatHistoryEntry, ChatHistorySnapshot, CreateSessionRequest, CreateSessionResponse,
    EncryptionHandshakeRecord, HandshakeParticipant, HandshakeStatus, HandshakeSubmission,
    HistoryQuery, RecipientIdentity, SendMessageRequest, SendMessageResponse,
    SessionEncryptionSummary,
};

#[derive(Debug, Clone)]
struct MemorySession {
    encryption: SessionEncryptionSummary,
    history: Vec<ChatHistoryEntry>,
    sent: Vec<SendMessageRequest>,
}

#[derive(Default)]
struct Counters {
    status_polls: AtomicUsize,
    submissions: AtomicUsize,
}

/// Broker stand-in shared by both parties of a conversation
#[derive(Clone)]
pub struct InMemoryBroker {
    sessions: Arc<RwLock<HashMap<String, MemorySession>>>,
    encryption_supported: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Broker that supports encryption
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            encryption_supported: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Broker whose sessions always report `enabled = false`
    pub fn without_encryption() -> Self {
        let broker = Self::new();
        broker.set_encryption_supported(false);
        broker
    }

    /// Affects sessions created after the call
    pub fn set_encryption_supported(&self, supported: bool) {
        self.encryption_supported.store(supported, Ordering::SeqCst);
    }

    /// Messages received for a session, in order
    pub async fn sent_messages(&self, session_id: &str) -> Vec<SendMessageRequest> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.sent.clone())
            .unwrap_or_default()
    }

    /// Append an entry directly to a session's history
    pub async fn push_history(&self, session_id: &str, entry: ChatHistoryEntry) -> Result<(), BrokerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;
        session.history.push(entry);
        Ok(())
    }

    pub async fn contains_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Ids of all live sessions
    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Number of encryption status requests served
    pub fn status_polls(&self) -> usize {
        self.counters.status_polls.load(Ordering::SeqCst)
    }

    /// Number of handshake submissions accepted
    pub fn submissions(&self) -> usize {
        self.counters.submissions.load(Ordering::SeqCst)
    }
}

fn not_found(session_id: &str) -> BrokerError {
    BrokerError::SessionNotFound {
        session_id: session_id.to_string(),
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, BrokerError> {
        if request.uaid.is_none() && request.agent_url.is_none() {
            return Err(BrokerError::InvalidRequest {
                reason: "either uaid or agentUrl is required".to_string(),
            });
        }

        let session_id = Uuid::new_v4().to_string();
        let enabled = request.encryption_requested.unwrap_or(false)
            && self.encryption_supported.load(Ordering::SeqCst);

        let encryption = SessionEncryptionSummary {
            enabled,
            requester: request
                .sender_uaid
                .as_ref()
                .map(RecipientIdentity::from_uaid),
            responder: request.uaid.as_ref().map(RecipientIdentity::from_uaid),
            handshake: enabled.then(EncryptionHandshakeRecord::default),
        };

        self.sessions.write().await.insert(
            session_id.clone(),
            MemorySession {
                encryption: encryption.clone(),
                history: Vec::new(),
                sent: Vec::new(),
            },
        );

        Ok(CreateSessionResponse {
            session_id,
            encryption: Some(encryption),
            history_ttl_seconds: request.history_ttl_seconds,
        })
    }

    async fn get_encryption_status(
        &self,
        session_id: &str,
    ) -> Result<SessionEncryptionSummary, BrokerError> {
        self.counters.status_polls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.encryption.clone())
            .ok_or_else(|| not_found(session_id))
    }

    async fn submit_handshake(
        &self,
        session_id: &str,
        submission: &HandshakeSubmission,
    ) -> Result<EncryptionHandshakeRecord, BrokerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;

        if !session.encryption.enabled {
            return Err(BrokerError::Http {
                status: 409,
                message: "encryption is not enabled for this session".to_string(),
                body: None,
            });
        }
        if submission.ephemeral_public_key.trim().is_empty() {
            return Err(BrokerError::InvalidRequest {
                reason: "ephemeralPublicKey is required".to_string(),
            });
        }

        let record = session
            .encryption
            .handshake
            .get_or_insert_with(EncryptionHandshakeRecord::default);
        *record.participant_mut(submission.role) = Some(HandshakeParticipant {
            ephemeral_public_key: submission.ephemeral_public_key.clone(),
            identity: submission.identity.clone(),
            submitted_at: Some(Utc::now().to_rfc3339()),
        });
        record.status = if record.requester.is_some() && record.responder.is_some() {
            HandshakeStatus::Complete
        } else {
            HandshakeStatus::Pending
        };

        self.counters.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, BrokerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| not_found(&request.session_id))?;

        if request.message.is_none() && request.cipher_envelope.is_none() {
            return Err(BrokerError::InvalidRequest {
                reason: "message or cipherEnvelope is required".to_string(),
            });
        }

        let message_id = Uuid::new_v4().to_string();
        session.sent.push(request.clone());
        session.history.push(ChatHistoryEntry {
            message_id: Some(message_id.clone()),
            role: "user".to_string(),
            content: request.message.clone().unwrap_or_default(),
            timestamp: Some(Utc::now().to_rfc3339()),
            cipher_envelope: request.cipher_envelope.clone(),
            metadata: None,
        });

        Ok(SendMessageResponse {
            session_id: Some(request.session_id.clone()),
            message_id: Some(message_id),
            ..Default::default()
        })
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        query: &HistoryQuery,
    ) -> Result<ChatHistorySnapshot, BrokerError> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(session_id).ok_or_else(|| not_found(session_id))?;

        let history = match query.limit {
            Some(limit) if limit < session.history.len() => {
                session.history[session.history.len() - limit..].to_vec()
            }
            _ => session.history.clone(),
        };

        Ok(ChatHistorySnapshot {
            session_id: session_id.to_string(),
            history,
            history_ttl_seconds: None,
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<(), BrokerError> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| not_found(session_id))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
