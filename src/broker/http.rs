// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the registry broker REST API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::error::BrokerError;
use super::transport::BrokerTransport;
use super::types::{
    ChatHistorySnapshot, CreateSessionRequest, CreateSessionResponse, EncryptionHandshakeRecord,
    EncryptionStatusResponse, HandshakeSubmission, HandshakeSubmissionResponse, HistoryQuery,
    SendMessageRequest, SendMessageResponse, SessionEncryptionSummary,
};
use crate::config::BrokerConfig;

const API_KEY_HEADER: &str = "x-api-key";

/// Broker transport over HTTPS
pub struct HttpBroker {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpBroker {
    /// Create a new HttpBroker from validated configuration
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        config.validate().map_err(|e| BrokerError::InvalidRequest {
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            BrokerError::InvalidRequest {
                reason: format!("invalid base_url: {}", e),
            }
        })?;
        info!(
            base_url = %base_url,
            api_key = config.api_key.is_some(),
            "Broker client configured"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Check if the broker is reachable
    pub async fn health_check(&self) -> bool {
        let url = match self.url(&["health"]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.request(Method::GET, url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Broker health check failed: {}", e);
                false
            }
        }
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment
    fn url(&self, segments: &[&str]) -> Result<Url, BrokerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BrokerError::InvalidRequest {
                reason: format!("base_url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }
}

/// Map a broker response to `T`, turning non-2xx into `BrokerError::Http`
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, BrokerError> {
    let status = response.status();
    if !status.is_success() {
        return Err(error_from_response(response).await);
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        BrokerError::Decode(format!("{} (status {}): {}", e, status.as_u16(), truncate(&text)))
    })
}

async fn error_from_response(response: Response) -> BrokerError {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let body = serde_json::from_str::<Value>(&text).ok();

    let message = body
        .as_ref()
        .and_then(|b| {
            b.get("error")
                .or_else(|| b.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate(&text));

    BrokerError::Http {
        status,
        message,
        body,
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 256;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// 404 on a session-scoped route means the session is gone
fn session_scoped(session_id: &str, err: BrokerError) -> BrokerError {
    match err {
        BrokerError::Http { status: 404, .. } => BrokerError::SessionNotFound {
            session_id: session_id.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl BrokerTransport for HttpBroker {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, BrokerError> {
        let response = self
            .request(Method::POST, self.url(&["chat", "session"])?)
            .json(request)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn get_encryption_status(
        &self,
        session_id: &str,
    ) -> Result<SessionEncryptionSummary, BrokerError> {
        let url = self.url(&["chat", "session", session_id, "encryption"])?;
        let response = self.request(Method::GET, url).send().await?;
        let status: EncryptionStatusResponse = parse_response(response)
            .await
            .map_err(|e| session_scoped(session_id, e))?;
        Ok(status.encryption.unwrap_or_default())
    }

    async fn submit_handshake(
        &self,
        session_id: &str,
        submission: &HandshakeSubmission,
    ) -> Result<EncryptionHandshakeRecord, BrokerError> {
        let url = self.url(&["chat", "session", session_id, "encryption-handshake"])?;
        let response = self
            .request(Method::POST, url)
            .json(submission)
            .send()
            .await?;
        let body: HandshakeSubmissionResponse = parse_response(response)
            .await
            .map_err(|e| session_scoped(session_id, e))?;
        Ok(body.handshake)
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, BrokerError> {
        let response = self
            .request(Method::POST, self.url(&["chat", "message"])?)
            .json(request)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        query: &HistoryQuery,
    ) -> Result<ChatHistorySnapshot, BrokerError> {
        let url = self.url(&["chat", "session", session_id, "history"])?;
        let mut builder = self.request(Method::GET, url);
        if let Some(limit) = query.limit {
            builder = builder.query(&[("limit", limit)]);
        }
        let response = builder.send().await?;
        parse_response(response)
            .await
            .map_err(|e| session_scoped(session_id, e))
    }

    async fn end_session(&self, session_id: &str) -> Result<(), BrokerError> {
        let url = self.url(&["chat", "session", session_id])?;
        let response = self.request(Method::DELETE, url).send().await?;

        // 204 No Content is the usual answer; any 2xx counts
        if !response.status().is_success() {
            return Err(session_scoped(session_id, error_from_response(response).await));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
