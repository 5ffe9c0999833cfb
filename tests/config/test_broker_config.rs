// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broker Configuration Tests

use anyhow::Result;
use fabstir_broker_chat::chat::{ChatError, EncryptedChatClient};
use fabstir_broker_chat::config::{BrokerConfig, ConfigError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[broker]
base_url = "https://broker.example.com/api/v1"
api_key = "k-123"

[broker.handshake]
poll_interval_ms = 250
"#
    )?;

    let config = BrokerConfig::from_file(file.path())?;
    assert_eq!(config.base_url, "https://broker.example.com/api/v1");
    assert_eq!(config.api_key.as_deref(), Some("k-123"));
    assert_eq!(config.handshake.poll_interval(), Duration::from_millis(250));
    // Unset values keep their defaults
    assert_eq!(config.handshake.timeout(), Duration::from_secs(30));
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    Ok(())
}

#[test]
fn test_missing_file() {
    let err = BrokerConfig::from_file("/nonexistent/broker.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_invalid_values_rejected() {
    let err = BrokerConfig::from_toml_str(r#"base_url = "ftp://broker.example.com""#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));

    let err = BrokerConfig::from_toml_str(
        r#"
        [handshake]
        timeout_ms = 0
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));

    let err = BrokerConfig::from_toml_str("base_url = [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_from_env() {
    std::env::set_var("BROKER_BASE_URL", "https://env.example.com/api/v1");
    std::env::set_var("BROKER_HANDSHAKE_TIMEOUT_MS", "12000");
    std::env::set_var("BROKER_HANDSHAKE_POLL_MS", "not-a-number");

    let config = BrokerConfig::from_env();
    assert_eq!(config.base_url, "https://env.example.com/api/v1");
    assert_eq!(config.handshake.timeout(), Duration::from_secs(12));
    // Unparseable values fall back to the default
    assert_eq!(config.handshake.poll_interval(), Duration::from_secs(1));

    std::env::remove_var("BROKER_BASE_URL");
    std::env::remove_var("BROKER_HANDSHAKE_TIMEOUT_MS");
    std::env::remove_var("BROKER_HANDSHAKE_POLL_MS");
}

#[test]
fn test_client_from_config() {
    let client = EncryptedChatClient::from_config(
        &BrokerConfig::new("https://broker.example.com/api/v1").with_api_key("k"),
    );
    assert!(client.is_ok());
    assert_eq!(client.unwrap().broker().name(), "http");

    let err = EncryptedChatClient::from_config(&BrokerConfig::new("not a url")).unwrap_err();
    assert!(matches!(err, ChatError::Configuration { .. }));
}
