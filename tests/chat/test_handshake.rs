// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake Coordination Tests
//!
//! Runs on a paused clock so timeout and cancellation bounds can be checked
//! exactly.

use super::support::{client, POLL, TIMEOUT};
use anyhow::Result;
use fabstir_broker_chat::broker::{
    BrokerTransport, CreateSessionRequest, HandshakeRole, InMemoryBroker,
    SessionEncryptionSummary,
};
use fabstir_broker_chat::chat::{
    AcceptSessionOptions, EncryptionPreference, HandshakeCoordinator, HandshakeOutcome,
    StartSessionOptions,
};
use fabstir_broker_chat::config::HandshakeConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

async fn encrypted_session(broker: &InMemoryBroker) -> Result<(String, SessionEncryptionSummary)> {
    let response = broker
        .create_session(&CreateSessionRequest {
            uaid: Some("uaid:bob".to_string()),
            sender_uaid: Some("uaid:alice".to_string()),
            encryption_requested: Some(true),
            ..Default::default()
        })
        .await?;
    Ok((response.session_id, response.encryption.unwrap_or_default()))
}

fn coordinators(broker: &InMemoryBroker) -> (HandshakeCoordinator, HandshakeCoordinator) {
    let transport: Arc<dyn BrokerTransport> = Arc::new(broker.clone());
    let config = HandshakeConfig::new(POLL, TIMEOUT);
    (
        HandshakeCoordinator::new(transport.clone(), config),
        HandshakeCoordinator::new(transport, config),
    )
}

fn assert_converged(requester: &HandshakeOutcome, responder: &HandshakeOutcome) {
    assert_eq!(requester.shared_secret, responder.shared_secret);
    assert_eq!(requester.role, HandshakeRole::Requester);
    assert_eq!(responder.role, HandshakeRole::Responder);
    assert!(requester.record.is_complete());
    assert_eq!(
        requester.record.public_key(HandshakeRole::Responder),
        Some(responder.local_public_key.as_str())
    );
    assert_eq!(
        responder.record.public_key(HandshakeRole::Requester),
        Some(requester.local_public_key.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_responder_publishes_first() -> Result<()> {
    let broker = InMemoryBroker::new();
    let (session_id, summary) = encrypted_session(&broker).await?;
    let (requester, responder) = coordinators(&broker);
    let cancel = CancellationToken::new();

    let responding = tokio::spawn({
        let session_id = session_id.clone();
        let cancel = cancel.clone();
        async move { responder.respond(&session_id, None, &cancel).await }
    });

    tokio::time::sleep(POLL * 3).await;
    assert_eq!(broker.submissions(), 1, "responder should be waiting on the requester");

    let a = requester.request(&session_id, summary, None, &cancel).await?;
    let b = responding.await??;
    assert_converged(&a, &b);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_requester_publishes_first() -> Result<()> {
    let broker = InMemoryBroker::new();
    let (session_id, summary) = encrypted_session(&broker).await?;
    let (requester, responder) = coordinators(&broker);
    let cancel = CancellationToken::new();

    let requesting = tokio::spawn({
        let session_id = session_id.clone();
        let cancel = cancel.clone();
        async move { requester.request(&session_id, summary, None, &cancel).await }
    });

    tokio::time::sleep(POLL * 3).await;
    assert_eq!(broker.submissions(), 1, "requester should be waiting on the responder");

    let b = responder.respond(&session_id, None, &cancel).await?;
    let a = requesting.await??;
    assert_converged(&a, &b);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sessions_are_independent() -> Result<()> {
    let broker = InMemoryBroker::new();
    let (first, first_summary) = encrypted_session(&broker).await?;
    let (second, second_summary) = encrypted_session(&broker).await?;
    let (requester, responder) = coordinators(&broker);
    let cancel = CancellationToken::new();

    let (a1, b1, a2, b2) = tokio::join!(
        requester.request(&first, first_summary, None, &cancel),
        responder.respond(&first, None, &cancel),
        requester.request(&second, second_summary, None, &cancel),
        responder.respond(&second, None, &cancel),
    );
    let (a1, b1, a2, b2) = (a1?, b1?, a2?, b2?);

    assert_converged(&a1, &b1);
    assert_converged(&a2, &b2);
    assert_ne!(a1.shared_secret, a2.shared_secret);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_bounded() {
    let broker = InMemoryBroker::new();
    let alice = client(&broker);

    let started = Instant::now();
    let err = alice
        .start_session(
            StartSessionOptions::to_uaid("uaid:bob")
                .with_preference(EncryptionPreference::Required),
        )
        .await
        .unwrap_err();
    let waited = started.elapsed();

    assert!(err.is_timeout(), "unexpected error: {}", err);
    assert!(waited >= TIMEOUT, "gave up early after {:?}", waited);
    assert!(waited <= TIMEOUT + POLL, "overran deadline: {:?}", waited);

    // Our key made it to the broker; the peer's never did
    let record = err.summary().unwrap().handshake.clone().unwrap();
    assert!(record.public_key(HandshakeRole::Requester).is_some());
    assert!(record.public_key(HandshakeRole::Responder).is_none());
    assert_eq!(alice.registry().count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_not_masked_by_preferred() {
    let broker = InMemoryBroker::new();
    let alice = client(&broker);

    let err = alice
        .start_session(
            StartSessionOptions::to_uaid("uaid:bob").with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_abort_during_wait() {
    let broker = InMemoryBroker::new();
    let alice = client(&broker);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = alice
        .start_session(
            StartSessionOptions::to_uaid("uaid:bob")
                .with_timeout(Duration::from_secs(60))
                .with_cancellation(cancel),
        )
        .await
        .unwrap_err();

    assert!(err.is_aborted(), "unexpected error: {}", err);
    assert!(started.elapsed() < Duration::from_secs(1));
    let session_id = err.session_id().unwrap().to_string();
    assert!(broker.contains_session(&session_id).await);
    assert_eq!(alice.registry().count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_interval_override() -> Result<()> {
    let broker = InMemoryBroker::new();
    let alice = client(&broker);

    let err = alice
        .start_session(
            StartSessionOptions::to_uaid("uaid:bob")
                .with_poll_interval(Duration::from_millis(500))
                .with_timeout(Duration::from_secs(2)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    // 2s / 500ms
    assert_eq!(broker.status_polls(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_responder_takes_over_the_slot() -> Result<()> {
    let broker = InMemoryBroker::new();
    let (session_id, summary) = encrypted_session(&broker).await?;
    let (requester, first) = coordinators(&broker);
    let (_, second) = coordinators(&broker);
    let cancel = CancellationToken::new();

    let first_responding = tokio::spawn({
        let session_id = session_id.clone();
        let cancel = cancel.clone();
        async move { first.respond(&session_id, None, &cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second_responding = tokio::spawn({
        let session_id = session_id.clone();
        let cancel = cancel.clone();
        async move { second.respond(&session_id, None, &cancel).await }
    });

    tokio::time::sleep(POLL * 3).await;
    let a = requester.request(&session_id, summary, None, &cancel).await?;

    let err = first_responding.await?.unwrap_err();
    assert!(err.is_superseded(), "unexpected error: {}", err);
    assert_eq!(err.session_id(), Some(session_id.as_str()));
    let record = err.summary().unwrap().handshake.clone().unwrap();
    assert!(record.public_key(HandshakeRole::Responder).is_some());

    let b = second_responding.await??;
    assert_converged(&a, &b);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_superseded_accept_is_not_downgraded() -> Result<()> {
    let broker = InMemoryBroker::new();
    let (session_id, summary) = encrypted_session(&broker).await?;
    let (requester, _) = coordinators(&broker);
    let bob = client(&broker);
    let other = client(&broker);

    let bob_accepting = tokio::spawn({
        let (bob, session_id) = (bob.clone(), session_id.clone());
        async move { bob.accept_session(&session_id, AcceptSessionOptions::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let other_accepting = tokio::spawn({
        let (other, session_id) = (other.clone(), session_id.clone());
        async move { other.accept_session(&session_id, AcceptSessionOptions::new()).await }
    });

    tokio::time::sleep(POLL * 3).await;
    let a = requester
        .request(&session_id, summary, None, &CancellationToken::new())
        .await?;

    // Preferred only falls back when encryption is unavailable
    let err = bob_accepting.await?.unwrap_err();
    assert!(err.is_superseded(), "unexpected error: {}", err);
    assert_eq!(bob.registry().count().await, 0);

    let handle = other_accepting.await??;
    assert!(handle.is_encrypted());
    assert_eq!(
        other.registry().shared_secret(&session_id).await,
        Some(a.shared_secret)
    );
    Ok(())
}
