// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broker-relayed two-party chat
//!
//! ```text
//! EncryptedChatClient::start_session ─┐
//!                                     ├─ HandshakeCoordinator ─→ ConversationHandle
//! EncryptedChatClient::accept_session ┘       (ECDH via broker)     ├─ Plaintext
//!                                                                   └─ Encrypted
//! ```

pub mod error;
pub mod handle;
pub mod handshake;
pub mod options;
pub mod session;

pub use error::ChatError;
pub use handle::{
    ConversationHandle, ConversationMode, DecryptedHistoryEntry, EncryptedConversation,
    PlaintextConversation,
};
pub use handshake::{cancellable_sleep, HandshakeCoordinator, HandshakeOutcome};
pub use options::{
    AcceptSessionOptions, ChatTarget, EncryptionPreference, HandshakeOverrides, SendOptions,
    StartSessionOptions,
};
pub use session::EncryptedChatClient;
