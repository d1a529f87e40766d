// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory database, session tokens, server resources and local mock upstreams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `semantc_server`

use std::env;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;

use semantc_server::{
    auth::SharedSecretSessionVerifier,
    config::environment::{
        Environment, ProvisioningConfig, ServerConfig, SessionConfig, SessionVerifierKind,
    },
    crypto::TokenCipher,
    database::Database,
    middleware::InMemoryRateLimitStore,
    resources::ServerResources,
};

pub const TEST_BASE_URL: &str = "https://app.semantc.test";
pub const TEST_ENCRYPTION_KEY: &str = "integration-test-encryption-key";
pub const TEST_SESSION_SECRET: &str = "integration-test-session-secret";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Configuration with a shared-secret session verifier and fast provisioning retries
pub fn test_config() -> ServerConfig {
    ServerConfig {
        base_url: TEST_BASE_URL.to_owned(),
        environment: Environment::Testing,
        database_url: "sqlite::memory:".to_owned(),
        encryption_key: TEST_ENCRYPTION_KEY.to_owned(),
        session: SessionConfig {
            verifier: SessionVerifierKind::SharedSecret,
            jwt_secret: Some(TEST_SESSION_SECRET.to_owned()),
            ..SessionConfig::default()
        },
        // Nothing listens on the discard port; tests that care point this at a mock
        provisioning: ProvisioningConfig {
            url: "http://127.0.0.1:9/provision".to_owned(),
            retry_delay: Duration::from_millis(10),
            xero_timeout: Duration::from_secs(2),
            shopify_timeout: Duration::from_secs(2),
            ..ProvisioningConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Standard test database setup
pub async fn create_test_database() -> Database {
    create_test_database_with_key(TEST_ENCRYPTION_KEY).await
}

/// Test database sealing tokens with a specific key
pub async fn create_test_database_with_key(key: &str) -> Database {
    init_test_logging();
    let cipher = TokenCipher::from_secret(key).unwrap();
    Database::new("sqlite::memory:", cipher).await.unwrap()
}

/// Resources over a fresh in-memory database
pub async fn create_test_server_resources(config: ServerConfig) -> Arc<ServerResources> {
    let database = create_test_database_with_key(&config.encryption_key).await;
    let verifier = Arc::new(SharedSecretSessionVerifier::new(TEST_SESSION_SECRET));
    Arc::new(ServerResources::assemble(
        config,
        database,
        verifier,
        Arc::new(InMemoryRateLimitStore::new()),
        reqwest::Client::new(),
    ))
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    email: String,
    exp: i64,
    iat: i64,
}

/// HS256 session token for `user_id`, valid for an hour
pub fn mint_session_token(user_id: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = TestClaims {
        sub: user_id,
        email: format!("{user_id}@example.com"),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SESSION_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_mock(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Request bodies received by a mock upstream
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Value>>>,
}

impl CallLog {
    pub fn record(&self, body: Value) {
        self.calls.lock().unwrap().push(body);
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}
