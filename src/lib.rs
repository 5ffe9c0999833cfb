// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod broker;
pub mod chat;
pub mod config;
pub mod crypto;

// Re-export main types
pub use broker::{BrokerError, BrokerTransport, HttpBroker, InMemoryBroker};
pub use chat::{
    AcceptSessionOptions, ChatError, ChatTarget, ConversationHandle, ConversationMode,
    EncryptedChatClient, EncryptionPreference, SendOptions, StartSessionOptions,
};
pub use config::{BrokerConfig, ConfigError, HandshakeConfig};
pub use crypto::{CipherEnvelope, CryptoError, SharedSecret};
