// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Registry broker access
//!
//! The broker relays every chat message and stores history, so it is treated
//! as untrusted for content: only envelopes and public keys cross it.
//!
//! ```text
//! EncryptedChatClient → BrokerTransport → HttpBroker → broker REST API
//!                                       ↘ InMemoryBroker (tests, demos)
//! ```

pub mod error;
pub mod http;
pub mod memory;
pub mod transport;
pub mod types;

pub use error::BrokerError;
pub use http::HttpBroker;
pub use memory::InMemoryBroker;
pub use transport::BrokerTransport;
pub use types::{
    AgentAuth, ChatHistoryEntry, ChatHistorySnapshot, CreateSessionRequest,
    CreateSessionResponse, EncryptionHandshakeRecord, EncryptionStatusResponse,
    HandshakeParticipant, HandshakeRole, HandshakeStatus, HandshakeSubmission,
    HandshakeSubmissionResponse, HistoryQuery, RecipientIdentity, SendMessageRequest,
    SendMessageResponse, SessionEncryptionSummary,
};
