// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! History Decryption Tests
//!
//! A session's history can hold entries the current secret cannot open:
//! plaintext turns from before the handshake, or envelopes from another
//! handshake. Those come back without plaintext instead of failing the fetch.

use super::support::establish_pair;
use anyhow::Result;
use fabstir_broker_chat::broker::{ChatHistoryEntry, HistoryQuery, InMemoryBroker};
use fabstir_broker_chat::chat::SendOptions;
use fabstir_broker_chat::crypto::{encrypt_envelope, EphemeralKeyPair};

#[tokio::test(start_paused = true)]
async fn test_mixed_epoch_history() -> Result<()> {
    let broker = InMemoryBroker::new();
    let pair = establish_pair(&broker).await?;
    let session_id = pair.alice_handle.session_id().to_string();

    // Plaintext turn recorded before encryption kicked in
    broker
        .push_history(
            &session_id,
            ChatHistoryEntry {
                role: "user".to_string(),
                content: "pre-handshake".to_string(),
                ..Default::default()
            },
        )
        .await?;

    // Envelope sealed under an unrelated handshake
    let stale = EphemeralKeyPair::generate()
        .derive_shared_secret(&EphemeralKeyPair::generate().public_key_bytes())?;
    broker
        .push_history(
            &session_id,
            ChatHistoryEntry {
                role: "assistant".to_string(),
                cipher_envelope: Some(encrypt_envelope("stale", &stale, &session_id, None, &[])?),
                ..Default::default()
            },
        )
        .await?;

    pair.alice_handle.send(SendOptions::text("current")).await?;

    let history = pair.bob_handle.fetch_history(HistoryQuery::default()).await?;
    let texts: Vec<_> = history.iter().map(|e| e.plaintext.as_deref()).collect();
    assert_eq!(texts, vec![None, None, Some("current")]);

    // The raw entries are still there for callers that want them
    assert_eq!(history[0].entry.content, "pre-handshake");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_history_limit() -> Result<()> {
    let broker = InMemoryBroker::new();
    let pair = establish_pair(&broker).await?;

    for text in ["one", "two", "three"] {
        pair.alice_handle.send(SendOptions::text(text)).await?;
    }

    let history = pair
        .bob_handle
        .fetch_history(HistoryQuery { limit: Some(2) })
        .await?;
    let texts: Vec<_> = history.iter().map(|e| e.plaintext.as_deref()).collect();
    assert_eq!(texts, vec![Some("two"), Some("three")]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_envelope_from_other_session_is_unreadable() -> Result<()> {
    let broker = InMemoryBroker::new();
    let pair = establish_pair(&broker).await?;

    pair.alice_handle.send(SendOptions::text("only here")).await?;
    let session_id = pair.alice_handle.session_id();
    let mut lifted = broker.sent_messages(session_id).await[0]
        .cipher_envelope
        .clone()
        .expect("encrypted send carries an envelope");

    // Re-label it for another session; the AAD still pins it to this one
    lifted.key_locator.session_id = "other-session".to_string();
    lifted.associated_data = None;

    let entry = ChatHistoryEntry {
        cipher_envelope: Some(lifted),
        ..Default::default()
    };
    assert_eq!(pair.bob_handle.decrypt_history_entry(&entry), None);
    Ok(())
}
