// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Options for establishing sessions and sending messages

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::broker::{AgentAuth, RecipientIdentity};

/// How hard to insist on end-to-end encryption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptionPreference {
    /// Fail if the session cannot be encrypted
    Required,
    /// Encrypt when possible, otherwise fall back to plaintext
    #[default]
    Preferred,
    /// Never attempt a handshake
    Disabled,
}

/// Remote agent to open a session with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Uaid(String),
    AgentUrl(String),
}

impl ChatTarget {
    pub fn uaid(&self) -> Option<&str> {
        match self {
            ChatTarget::Uaid(uaid) => Some(uaid),
            ChatTarget::AgentUrl(_) => None,
        }
    }
}

/// Handshake tuning shared by start and accept
#[derive(Debug, Clone, Default)]
pub struct HandshakeOverrides {
    pub poll_interval: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Cancels the handshake wait with `ChatError::Aborted`
    pub cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone)]
pub struct StartSessionOptions {
    pub target: ChatTarget,
    pub preference: EncryptionPreference,
    /// Our own identity, published with the handshake
    pub identity: Option<RecipientIdentity>,
    pub auth: Option<AgentAuth>,
    pub history_ttl_seconds: Option<u64>,
    pub handshake: HandshakeOverrides,
}

impl StartSessionOptions {
    pub fn new(target: ChatTarget) -> Self {
        Self {
            target,
            preference: EncryptionPreference::default(),
            identity: None,
            auth: None,
            history_ttl_seconds: None,
            handshake: HandshakeOverrides::default(),
        }
    }

    /// Session addressed to a registered agent
    pub fn to_uaid(uaid: impl Into<String>) -> Self {
        Self::new(ChatTarget::Uaid(uaid.into()))
    }

    pub fn with_preference(mut self, preference: EncryptionPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_identity(mut self, identity: RecipientIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_auth(mut self, auth: AgentAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.handshake.poll_interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handshake.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.handshake.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AcceptSessionOptions {
    pub preference: EncryptionPreference,
    pub identity: Option<RecipientIdentity>,
    pub handshake: HandshakeOverrides,
}

impl AcceptSessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preference(mut self, preference: EncryptionPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_identity(mut self, identity: RecipientIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.handshake.poll_interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handshake.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.handshake.cancel = Some(cancel);
        self
    }
}

/// One outgoing chat turn
///
/// Plaintext handles send `message`; encrypted handles seal `plaintext` and
/// never put raw text on the wire.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub message: String,
    pub plaintext: Option<String>,
    pub auth: Option<AgentAuth>,
    pub streaming: Option<bool>,
}

impl SendOptions {
    /// Raw message, usable on plaintext handles only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Same text for both modes; works on any handle
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: text.clone(),
            plaintext: Some(text),
            ..Default::default()
        }
    }

    pub fn with_plaintext(mut self, plaintext: impl Into<String>) -> Self {
        self.plaintext = Some(plaintext.into());
        self
    }

    pub fn with_auth(mut self, auth: AgentAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }
}
