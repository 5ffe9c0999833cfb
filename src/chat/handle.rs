// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Conversation handles
//!
//! A [`ConversationHandle`] is what callers hold after a session is
//! established. The variant is fixed at construction: plaintext sessions send
//! text as-is, encrypted sessions seal every turn into a cipher envelope. Both
//! expose the same `send` / `fetch_history` / `decrypt_history_entry` surface.

use std::sync::Arc;
use tracing::debug;

use super::error::ChatError;
use super::options::SendOptions;
use crate::broker::{
    BrokerTransport, ChatHistoryEntry, HandshakeRole, HistoryQuery, RecipientIdentity,
    SendMessageRequest, SendMessageResponse, SessionEncryptionSummary,
};
use crate::crypto::{decrypt_envelope_opt, encrypt_envelope, open_envelope, SharedSecret};

/// Which mode a handle operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationMode {
    Plaintext,
    Encrypted,
}

/// History entry paired with its readable text
///
/// `plaintext` is `None` when the entry could not be decrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedHistoryEntry {
    pub entry: ChatHistoryEntry,
    pub plaintext: Option<String>,
}

/// Session without end-to-end encryption
pub struct PlaintextConversation {
    session_id: String,
    broker: Arc<dyn BrokerTransport>,
    summary: Option<SessionEncryptionSummary>,
}

/// Session protected by a negotiated shared secret
pub struct EncryptedConversation {
    session_id: String,
    broker: Arc<dyn BrokerTransport>,
    role: HandshakeRole,
    shared_secret: SharedSecret,
    recipients: Vec<RecipientIdentity>,
    summary: SessionEncryptionSummary,
}

/// Uniform handle over both modes
pub enum ConversationHandle {
    Plaintext(PlaintextConversation),
    Encrypted(EncryptedConversation),
}

impl ConversationHandle {
    pub fn plaintext(
        session_id: impl Into<String>,
        broker: Arc<dyn BrokerTransport>,
        summary: Option<SessionEncryptionSummary>,
    ) -> Self {
        ConversationHandle::Plaintext(PlaintextConversation {
            session_id: session_id.into(),
            broker,
            summary,
        })
    }

    pub fn encrypted(
        session_id: impl Into<String>,
        broker: Arc<dyn BrokerTransport>,
        role: HandshakeRole,
        shared_secret: SharedSecret,
        recipients: Vec<RecipientIdentity>,
        summary: SessionEncryptionSummary,
    ) -> Self {
        ConversationHandle::Encrypted(EncryptedConversation {
            session_id: session_id.into(),
            broker,
            role,
            shared_secret,
            recipients,
            summary,
        })
    }

    pub fn session_id(&self) -> &str {
        match self {
            ConversationHandle::Plaintext(c) => &c.session_id,
            ConversationHandle::Encrypted(c) => &c.session_id,
        }
    }

    pub fn mode(&self) -> ConversationMode {
        match self {
            ConversationHandle::Plaintext(_) => ConversationMode::Plaintext,
            ConversationHandle::Encrypted(_) => ConversationMode::Encrypted,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.mode() == ConversationMode::Encrypted
    }

    /// Our role in the handshake; `None` for plaintext sessions
    pub fn role(&self) -> Option<HandshakeRole> {
        match self {
            ConversationHandle::Plaintext(_) => None,
            ConversationHandle::Encrypted(c) => Some(c.role),
        }
    }

    /// Identities recorded on outgoing envelopes
    pub fn recipients(&self) -> &[RecipientIdentity] {
        match self {
            ConversationHandle::Plaintext(_) => &[],
            ConversationHandle::Encrypted(c) => &c.recipients,
        }
    }

    /// Encryption summary the handle was built from
    pub fn summary(&self) -> Option<&SessionEncryptionSummary> {
        match self {
            ConversationHandle::Plaintext(c) => c.summary.as_ref(),
            ConversationHandle::Encrypted(c) => Some(&c.summary),
        }
    }

    /// Send one chat turn
    ///
    /// Plaintext handles forward `message` verbatim. Encrypted handles require
    /// `plaintext`, seal it, and send only the envelope.
    pub async fn send(&self, options: SendOptions) -> Result<SendMessageResponse, ChatError> {
        let request = match self {
            ConversationHandle::Plaintext(c) => {
                let message = if options.message.is_empty() {
                    options.plaintext.unwrap_or_default()
                } else {
                    options.message
                };
                SendMessageRequest {
                    session_id: c.session_id.clone(),
                    message: Some(message),
                    streaming: options.streaming,
                    auth: options.auth,
                    cipher_envelope: None,
                }
            }
            ConversationHandle::Encrypted(c) => {
                let plaintext =
                    options
                        .plaintext
                        .ok_or_else(|| ChatError::MissingPlaintext {
                            session_id: c.session_id.clone(),
                        })?;
                let envelope = encrypt_envelope(
                    &plaintext,
                    &c.shared_secret,
                    &c.session_id,
                    None,
                    &c.recipients,
                )?;
                debug!(
                    session_id = %c.session_id,
                    plaintext_len = plaintext.len(),
                    recipients = c.recipients.len(),
                    "Sending encrypted chat message"
                );
                SendMessageRequest {
                    session_id: c.session_id.clone(),
                    message: None,
                    streaming: options.streaming,
                    auth: options.auth,
                    cipher_envelope: Some(envelope),
                }
            }
        };

        Ok(self.broker().send_message(&request).await?)
    }

    /// Readable text of one history entry
    ///
    /// Plaintext handles echo `content`. Encrypted handles return `None` for
    /// entries without an envelope or whose envelope fails to open.
    pub fn decrypt_history_entry(&self, entry: &ChatHistoryEntry) -> Option<String> {
        match self {
            ConversationHandle::Plaintext(_) => Some(entry.content.clone()),
            ConversationHandle::Encrypted(c) => {
                decrypt_envelope_opt(entry.cipher_envelope.as_ref(), &c.shared_secret)
            }
        }
    }

    /// Like `decrypt_history_entry`, but reports why an entry is unreadable
    pub fn open_history_entry(&self, entry: &ChatHistoryEntry) -> Result<String, ChatError> {
        match self {
            ConversationHandle::Plaintext(_) => Ok(entry.content.clone()),
            ConversationHandle::Encrypted(c) => {
                Ok(open_envelope(entry.cipher_envelope.as_ref(), &c.shared_secret)?)
            }
        }
    }

    /// Fetch the session history with each entry's readable text
    pub async fn fetch_history(
        &self,
        query: HistoryQuery,
    ) -> Result<Vec<DecryptedHistoryEntry>, ChatError> {
        let snapshot = self
            .broker()
            .fetch_history(self.session_id(), &query)
            .await?;

        Ok(snapshot
            .history
            .into_iter()
            .map(|entry| {
                let plaintext = self.decrypt_history_entry(&entry);
                DecryptedHistoryEntry { entry, plaintext }
            })
            .collect())
    }

    fn broker(&self) -> &Arc<dyn BrokerTransport> {
        match self {
            ConversationHandle::Plaintext(c) => &c.broker,
            ConversationHandle::Encrypted(c) => &c.broker,
        }
    }
}

impl std::fmt::Debug for ConversationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandle")
            .field("session_id", &self.session_id())
            .field("mode", &self.mode())
            .field("recipients", &self.recipients())
            .finish()
    }
}
