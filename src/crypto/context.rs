// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Conversation Context Registry
//!
//! Maps session ids to the shared secret negotiated for them, so history
//! fetched later (without the original handle) can still be decrypted.
//!
//! The registry belongs to one client instance. Each session id is written
//! once by the call that established it; entries stay until the caller
//! removes them (normally when the session ends).
//!
//! **Security**: Secrets live in memory only and are never persisted.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ecdh::SharedSecret;
use crate::broker::types::RecipientIdentity;

/// Everything needed to decrypt traffic for one session
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub session_id: String,
    pub shared_secret: SharedSecret,
    /// Our own identity in the session, when known
    pub identity: Option<RecipientIdentity>,
}

/// In-memory session -> context map
///
/// # Example
///
/// ```ignore
/// let registry = ConversationContextRegistry::new();
/// registry.register(context).await;
/// let secret = registry.shared_secret("session-123").await;
/// registry.remove("session-123").await;
/// ```
#[derive(Clone, Default)]
pub struct ConversationContextRegistry {
    contexts: Arc<RwLock<HashMap<String, ConversationContext>>>,
}

impl ConversationContextRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the context for a newly established session
    pub async fn register(&self, context: ConversationContext) {
        let mut contexts = self.contexts.write().await;
        let session_id = context.session_id.clone();
        if contexts.insert(session_id.clone(), context).is_some() {
            tracing::warn!(
                session_id = %session_id,
                "Replaced existing conversation context"
            );
        }
        tracing::info!(
            session_id = %session_id,
            total = contexts.len(),
            "Conversation context registered"
        );
    }

    /// Look up the context for a session
    pub async fn get(&self, session_id: &str) -> Option<ConversationContext> {
        let contexts = self.contexts.read().await;
        contexts.get(session_id).cloned()
    }

    /// Look up only the shared secret for a session
    pub async fn shared_secret(&self, session_id: &str) -> Option<SharedSecret> {
        let contexts = self.contexts.read().await;
        contexts.get(session_id).map(|ctx| ctx.shared_secret.clone())
    }

    /// Remove a session's context; returns whether one was present
    pub async fn remove(&self, session_id: &str) -> bool {
        let mut contexts = self.contexts.write().await;
        let removed = contexts.remove(session_id).is_some();
        if removed {
            tracing::info!(
                session_id = %session_id,
                remaining = contexts.len(),
                "Conversation context removed"
            );
        }
        removed
    }

    /// Number of registered sessions
    pub async fn count(&self) -> usize {
        self.contexts.read().await.len()
    }
}
