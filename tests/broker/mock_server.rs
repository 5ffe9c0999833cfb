// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Minimal broker REST API backed by an in-memory broker

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use fabstir_broker_chat::broker::{
    BrokerError, BrokerTransport, CreateSessionRequest, EncryptionStatusResponse,
    HandshakeSubmission, HandshakeSubmissionResponse, HistoryQuery, InMemoryBroker,
    SendMessageRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;

pub const API_KEY: &str = "test-api-key";

#[derive(Clone)]
struct MockState {
    broker: InMemoryBroker,
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

/// Serve the broker API on an ephemeral port; returns the `/api/v1` base URL
pub async fn start(broker: InMemoryBroker) -> anyhow::Result<String> {
    let api = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/chat/session", post(create_session))
        .route("/chat/session/:id", delete(end_session))
        .route("/chat/session/:id/encryption", get(encryption_status))
        .route("/chat/session/:id/encryption-handshake", post(submit_handshake))
        .route("/chat/session/:id/history", get(history))
        .route("/chat/message", post(send_message))
        .with_state(MockState { broker });

    let app = Router::new().nest("/api/v1", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{}/api/v1", addr))
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == API_KEY => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid api key" })))
            .into_response()),
    }
}

fn reply<T: Serialize>(result: Result<T, BrokerError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: BrokerError) -> Response {
    let status = err
        .status()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn create_session(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    reply(state.broker.create_session(&request).await)
}

async fn encryption_status(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    reply(
        state
            .broker
            .get_encryption_status(&id)
            .await
            .map(|summary| EncryptionStatusResponse {
                session_id: Some(id.clone()),
                encryption: Some(summary),
            }),
    )
}

async fn submit_handshake(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(submission): Json<HandshakeSubmission>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    reply(
        state
            .broker
            .submit_handshake(&id, &submission)
            .await
            .map(|handshake| HandshakeSubmissionResponse {
                session_id: Some(id.clone()),
                handshake,
            }),
    )
}

async fn send_message(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    reply(state.broker.send_message(&request).await)
}

async fn history(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    let query = HistoryQuery {
        limit: params.limit,
    };
    reply(state.broker.fetch_history(&id, &query).await)
}

async fn end_session(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    match state.broker.end_session(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
