// ABOUTME: Tests for environment-based configuration loading
// ABOUTME: Serialized because they mutate process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;
use std::time::Duration;

use serial_test::serial;

use semantc_core::errors::ErrorCode;
use semantc_server::config::environment::{
    Environment, LogFormat, ServerConfig, SessionVerifierKind,
};

const VARS: &[&str] = &[
    "ENCRYPTION_KEY",
    "SESSION_VERIFIER",
    "SESSION_JWT_SECRET",
    "FIREBASE_PROJECT_ID",
    "BASE_URL",
    "ENVIRONMENT",
    "HTTP_PORT",
    "LOG_FORMAT",
    "SHOPIFY_VERIFY_HMAC",
    "PROVISION_MAX_RETRIES",
    "PROVISION_RETRY_DELAY_MS",
    "RATE_LIMIT_MAX_REQUESTS",
    "INTERNAL_API_KEY",
    "CLOUD_RUN_API_URL",
    "REQUEST_TIMEOUT_SECS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn set_minimal_env() {
    clear_env();
    env::set_var("ENCRYPTION_KEY", "config-test-key");
    env::set_var("FIREBASE_PROJECT_ID", "semantc-test");
}

#[test]
#[serial]
fn test_missing_encryption_key_is_an_error() {
    clear_env();
    env::set_var("FIREBASE_PROJECT_ID", "semantc-test");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigError);
    assert!(error.message.contains("ENCRYPTION_KEY"));
}

#[test]
#[serial]
fn test_defaults_apply() {
    set_minimal_env();

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.session.verifier, SessionVerifierKind::Firebase);
    assert_eq!(config.provisioning.max_retries, 3);
    assert_eq!(config.provisioning.retry_delay, Duration::from_secs(1));
    assert_eq!(config.provisioning.xero_timeout, Duration::from_secs(30));
    assert_eq!(config.provisioning.shopify_timeout, Duration::from_secs(150));
    assert_eq!(config.rate_limit.max_requests, 50);
    assert_eq!(config.rate_limit.window, Duration::from_secs(3600));
    assert_eq!(config.chat.timeout, Duration::from_secs(60));
    assert_eq!(config.request_timeout, Duration::from_secs(90));
    // Four Shopify-length attempts and three delays
    assert_eq!(config.provisioning.worst_case(), Duration::from_secs(603));
    assert!(config.shopify.verify_hmac);
    assert!(config.internal_api_key.is_none());
    assert_eq!(config.log_format, LogFormat::Pretty);
}

#[test]
#[serial]
fn test_overrides_are_parsed() {
    set_minimal_env();
    env::set_var("BASE_URL", "https://app.semantc.io/");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("HTTP_PORT", "9090");
    env::set_var("LOG_FORMAT", "json");
    env::set_var("SHOPIFY_VERIFY_HMAC", "false");
    env::set_var("PROVISION_MAX_RETRIES", "5");
    env::set_var("INTERNAL_API_KEY", "svc-key");
    env::set_var("CLOUD_RUN_API_URL", "https://chat.internal");
    env::set_var("REQUEST_TIMEOUT_SECS", "30");

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.base_url, "https://app.semantc.io");
    assert!(config.secure_cookies());
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.http_port, 9090);
    assert_eq!(config.log_format, LogFormat::Json);
    assert!(!config.shopify.verify_hmac);
    assert_eq!(config.provisioning.max_retries, 5);
    assert_eq!(config.internal_api_key.as_deref(), Some("svc-key"));
    assert_eq!(config.chat.api_url.as_deref(), Some("https://chat.internal"));
    assert_eq!(config.request_timeout, Duration::from_secs(30));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_numbers_are_rejected() {
    set_minimal_env();
    env::set_var("HTTP_PORT", "not-a-port");

    let error = ServerConfig::from_env().unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigError);
    assert!(error.message.contains("HTTP_PORT"));

    clear_env();
}

#[test]
#[serial]
fn test_shared_secret_verifier_requires_secret() {
    set_minimal_env();
    env::set_var("SESSION_VERIFIER", "shared_secret");
    assert!(ServerConfig::from_env().is_err());

    env::set_var("SESSION_JWT_SECRET", "hs256-secret");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.session.verifier, SessionVerifierKind::SharedSecret);

    clear_env();
}

#[test]
#[serial]
fn test_firebase_verifier_requires_project() {
    clear_env();
    env::set_var("ENCRYPTION_KEY", "config-test-key");

    let error = ServerConfig::from_env().unwrap_err();
    assert!(error.message.contains("FIREBASE_PROJECT_ID"));

    clear_env();
}
