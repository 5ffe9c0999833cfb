// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire types exchanged with the registry broker
//!
//! All JSON bodies use camelCase keys. Public keys travel as hex, binary
//! envelope fields as base64.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::crypto::CipherEnvelope;

/// Identity metadata for one party of a session
///
/// Used for bookkeeping and audit only; keys are never looked up by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl RecipientIdentity {
    /// Identity addressed by UAID only
    pub fn from_uaid(uaid: impl Into<String>) -> Self {
        Self {
            uaid: Some(uaid.into()),
            ..Default::default()
        }
    }

    /// At least one non-empty field is set
    pub fn is_usable(&self) -> bool {
        [&self.uaid, &self.ledger_account_id, &self.user_id, &self.email]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Which side of the handshake a party plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeRole {
    /// Party that created the session
    Requester,
    /// Party that accepted it
    Responder,
}

impl HandshakeRole {
    /// The other role
    pub fn peer(self) -> Self {
        match self {
            HandshakeRole::Requester => HandshakeRole::Responder,
            HandshakeRole::Responder => HandshakeRole::Requester,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandshakeRole::Requester => "requester",
            HandshakeRole::Responder => "responder",
        }
    }
}

impl fmt::Display for HandshakeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeStatus {
    #[default]
    Pending,
    Complete,
}

/// One role's published handshake data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParticipant {
    /// Hex-encoded compressed secp256k1 public key; empty until submitted
    #[serde(default)]
    pub ephemeral_public_key: String,
    #[serde(flatten)]
    pub identity: RecipientIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

/// Broker-held handshake state for a session
///
/// The broker only marks it `complete` once both roles have published a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionHandshakeRecord {
    #[serde(default)]
    pub status: HandshakeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<HandshakeParticipant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<HandshakeParticipant>,
}

impl EncryptionHandshakeRecord {
    pub fn participant(&self, role: HandshakeRole) -> Option<&HandshakeParticipant> {
        match role {
            HandshakeRole::Requester => self.requester.as_ref(),
            HandshakeRole::Responder => self.responder.as_ref(),
        }
    }

    pub fn participant_mut(&mut self, role: HandshakeRole) -> &mut Option<HandshakeParticipant> {
        match role {
            HandshakeRole::Requester => &mut self.requester,
            HandshakeRole::Responder => &mut self.responder,
        }
    }

    /// Published key for a role, if non-empty
    pub fn public_key(&self, role: HandshakeRole) -> Option<&str> {
        self.participant(role)
            .map(|p| p.ephemeral_public_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_complete(&self) -> bool {
        self.status == HandshakeStatus::Complete
    }

    /// Peer's key, once the record is complete from `role`'s point of view
    pub fn peer_key_when_complete(&self, role: HandshakeRole) -> Option<&str> {
        if !self.is_complete() {
            return None;
        }
        self.public_key(role.peer())
    }
}

/// Encryption state of a chat session as reported by the broker
///
/// `enabled == false` holds for the whole lifetime of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEncryptionSummary {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<RecipientIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<RecipientIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake: Option<EncryptionHandshakeRecord>,
}

impl SessionEncryptionSummary {
    pub fn identity(&self, role: HandshakeRole) -> Option<&RecipientIdentity> {
        match role {
            HandshakeRole::Requester => self.requester.as_ref(),
            HandshakeRole::Responder => self.responder.as_ref(),
        }
    }
}

/// Credentials forwarded to the remote agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAuth {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_value: Option<String>,
}

impl AgentAuth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            kind: "bearer".to_string(),
            token: Some(token.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AgentAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_ttl_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_requested: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_uaid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<SessionEncryptionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionStatusResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub encryption: Option<SessionEncryptionSummary>,
}

/// Body of a handshake submission for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeSubmission {
    pub role: HandshakeRole,
    pub ephemeral_public_key: String,
    #[serde(flatten)]
    pub identity: RecipientIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeSubmissionResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    pub handshake: EncryptionHandshakeRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub session_id: String,
    /// Raw text; never set when a cipher envelope is carried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AgentAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_envelope: Option<CipherEnvelope>,
}

/// Broker reply to a sent message
///
/// Replies are not encrypted by the broker; fields it adds beyond the
/// known ones are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// One entry of a session's history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_envelope: Option<CipherEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistorySnapshot {
    pub session_id: String,
    #[serde(default)]
    pub history: Vec<ChatHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only the most recent `limit` entries
    pub limit: Option<usize>,
}
