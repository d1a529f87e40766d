// ABOUTME: Shared server resources handed to every route as axum state
// ABOUTME: Wires configuration, database, session verifier and upstream clients together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{self, SessionVerifier};
use crate::chat::{ChatBackendClient, ChatRelay};
use crate::config::environment::ServerConfig;
use crate::crypto::TokenCipher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::middleware::{InMemoryRateLimitStore, RateLimitStore};
use crate::oauth::{ShopifyClient, XeroClient};
use crate::provisioning::ProvisioningClient;

/// Connect timeout for every outbound client; request timeouts are set per call
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Everything a handler may need
pub struct ServerResources {
    /// Loaded configuration
    pub config: ServerConfig,
    /// Datastore
    pub database: Database,
    /// Session verification
    pub verifier: Arc<dyn SessionVerifier>,
    /// Xero OAuth client
    pub xero: XeroClient,
    /// Shopify OAuth client
    pub shopify: ShopifyClient,
    /// Provisioning webhook client
    pub provisioning: ProvisioningClient,
    /// Chat relay
    pub chat: ChatRelay,
    /// Rate limiter counters
    pub rate_limit_store: Arc<dyn RateLimitStore>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ServerResources {
    /// Build resources from configuration: connect the database and the
    /// configured session verifier
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption key is empty, the database cannot
    /// be opened or the session verifier is misconfigured
    pub async fn from_config(config: ServerConfig) -> AppResult<Self> {
        let http = build_http_client()?;
        let cipher = TokenCipher::from_secret(&config.encryption_key)?;
        let database = Database::new(&config.database_url, cipher).await?;
        let verifier = auth::build_verifier(&config.session, http.clone())?;
        Ok(Self::assemble(
            config,
            database,
            verifier,
            Arc::new(InMemoryRateLimitStore::new()),
            http,
        ))
    }

    /// Wire resources from already-built parts
    #[must_use]
    pub fn assemble(
        config: ServerConfig,
        database: Database,
        verifier: Arc<dyn SessionVerifier>,
        rate_limit_store: Arc<dyn RateLimitStore>,
        http: reqwest::Client,
    ) -> Self {
        let xero = XeroClient::new(config.xero.clone(), http.clone());
        let shopify = ShopifyClient::new(config.shopify.clone(), http.clone());
        let provisioning =
            ProvisioningClient::new(config.provisioning.clone(), http.clone(), database.clone());
        let chat = ChatRelay::new(
            database.clone(),
            ChatBackendClient::new(config.chat.clone(), http),
        );

        Self {
            config,
            database,
            verifier,
            xero,
            shopify,
            provisioning,
            chat,
            rate_limit_store,
            started_at: Instant::now(),
        }
    }
}

/// Outbound HTTP client shared by every upstream integration
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized
pub fn build_http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))
}
