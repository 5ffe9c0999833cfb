// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broker transport trait definition

use async_trait::async_trait;

use super::error::BrokerError;
use super::types::{
    ChatHistorySnapshot, CreateSessionRequest, CreateSessionResponse, EncryptionHandshakeRecord,
    HandshakeSubmission, HistoryQuery, SendMessageRequest, SendMessageResponse,
    SessionEncryptionSummary,
};

/// Operations the chat client consumes from the registry broker
///
/// The broker is treated as a black box: it relays messages, stores history
/// and owns the authoritative handshake record. Implemented over HTTP by
/// [`HttpBroker`](super::HttpBroker) and in-process by
/// [`InMemoryBroker`](super::InMemoryBroker).
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Create a chat session, optionally asking for encryption
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, BrokerError>;

    /// Current encryption summary (including the handshake record)
    async fn get_encryption_status(
        &self,
        session_id: &str,
    ) -> Result<SessionEncryptionSummary, BrokerError>;

    /// Publish this party's ephemeral public key for its role
    async fn submit_handshake(
        &self,
        session_id: &str,
        submission: &HandshakeSubmission,
    ) -> Result<EncryptionHandshakeRecord, BrokerError>;

    /// Send plaintext or an envelope to the session
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, BrokerError>;

    /// Ordered history snapshot
    async fn fetch_history(
        &self,
        session_id: &str,
        query: &HistoryQuery,
    ) -> Result<ChatHistorySnapshot, BrokerError>;

    /// End and delete the session
    async fn end_session(&self, session_id: &str) -> Result<(), BrokerError>;

    /// Transport name for logging
    fn name(&self) -> &'static str;
}
