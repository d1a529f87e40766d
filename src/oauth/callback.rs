// ABOUTME: State machine that links a provider account after the OAuth redirect
// ABOUTME: Exchange code, discover organization, persist atomically, trigger provisioning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # OAuth callback flow
//!
//! ```text
//! AwaitingCode -> TokenExchanged -> OrgDiscovered -> Persisted
//!              -> ProvisioningTriggered -> Done
//! ```
//!
//! Any step may fail into [`CallbackError`]. The browser only ever sees a
//! redirect: `?status=success` or `?error=<code>`, or the login page when the
//! session is missing.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use semantc_core::models::ConnectorProvider;

use super::{LinkedOrganization, ProviderError, ShopifyClient, TokenResponse, XeroClient};
use crate::constants::redirects;
use crate::database::{Database, IntegrationUpsert, ProviderTokens};
use crate::errors::AppError;
use crate::provisioning::ProvisioningClient;

/// Save attempts before giving up with `storage_failed`
const STORAGE_ATTEMPTS: u32 = 2;

/// Progress through a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    /// Validating the redirect parameters and session
    AwaitingCode,
    /// Provider issued tokens
    TokenExchanged,
    /// Organization to link is known
    OrgDiscovered,
    /// Connector and credentials written
    Persisted,
    /// Provisioning call finished (successfully or not)
    ProvisioningTriggered,
    /// Flow complete
    Done,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AwaitingCode => "awaiting_code",
            Self::TokenExchanged => "token_exchanged",
            Self::OrgDiscovered => "org_discovered",
            Self::Persisted => "persisted",
            Self::ProvisioningTriggered => "provisioning_triggered",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// Terminal failure of a link
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Xero redirect without `code`
    #[error("authorization code missing")]
    NoCode,
    /// Shopify redirect without `code` or `shop`
    #[error("code or shop missing")]
    MissingParams,
    /// `shop` is not a `*.myshopify.com` host
    #[error("invalid shop domain")]
    InvalidShop,
    /// Shopify `hmac` did not verify
    #[error("callback signature did not verify")]
    InvalidHmac,
    /// `state` did not match the cookie set by the authorize endpoint
    #[error("state mismatch")]
    InvalidState,
    /// No or invalid session
    #[error("session required")]
    Unauthenticated,
    /// Token endpoint failed
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(ProviderError),
    /// Token endpoint answered without the required tokens
    #[error("token response lacked required tokens")]
    InvalidTokenData,
    /// Organization lookup failed
    #[error("organization lookup failed: {0}")]
    FetchOrgFailed(ProviderError),
    /// Token grants access to no organization
    #[error("no organizations connected")]
    NoOrganizations,
    /// Persisting failed after retrying
    #[error("storage failed: {0}")]
    StorageFailed(AppError),
    /// Anything else (misconfiguration included)
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl CallbackError {
    /// Query value for `?error=`; `None` means "send to login"
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::NoCode => Some("no_code"),
            Self::MissingParams => Some("missing_params"),
            Self::InvalidShop => Some("invalid_shop"),
            Self::InvalidHmac => Some("invalid_hmac"),
            Self::InvalidState => Some("invalid_state"),
            Self::Unauthenticated => None,
            Self::TokenExchangeFailed(_) => Some("token_exchange_failed"),
            Self::InvalidTokenData => Some("invalid_token_data"),
            Self::FetchOrgFailed(_) => Some("fetch_org_failed"),
            Self::NoOrganizations => Some("no_organizations"),
            Self::StorageFailed(_) => Some("storage_failed"),
            Self::Unexpected(_) => Some("unexpected"),
        }
    }
}

/// Where the browser goes once a callback finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Linked
    Success,
    /// Session missing or invalid
    Login,
    /// Failed with a redirect error code
    Failed(&'static str),
}

impl CallbackOutcome {
    /// Absolute redirect target under `base_url`
    #[must_use]
    pub fn location(&self, base_url: &str) -> String {
        match self {
            Self::Success => format!("{base_url}{}?status=success", redirects::INTEGRATIONS_PATH),
            Self::Login => format!("{base_url}{}", redirects::LOGIN_PATH),
            Self::Failed(code) => format!("{base_url}{}?error={code}", redirects::INTEGRATIONS_PATH),
        }
    }
}

impl From<Result<CallbackStage, CallbackError>> for CallbackOutcome {
    fn from(result: Result<CallbackStage, CallbackError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(error) => error.code().map_or(Self::Login, Self::Failed),
        }
    }
}

/// One link attempt, tracking its current stage for logging
pub struct CallbackFlow<'a> {
    provider: ConnectorProvider,
    user_id: &'a str,
    stage: CallbackStage,
}

impl<'a> CallbackFlow<'a> {
    /// Start a flow for a verified user
    #[must_use]
    pub const fn new(provider: ConnectorProvider, user_id: &'a str) -> Self {
        Self {
            provider,
            user_id,
            stage: CallbackStage::AwaitingCode,
        }
    }

    fn advance(&mut self, next: CallbackStage) {
        debug!(
            user_id = self.user_id,
            provider = %self.provider,
            from = %self.stage,
            to = %next,
            "OAuth callback advanced"
        );
        self.stage = next;
    }

    fn fail(&self, error: CallbackError) -> CallbackError {
        warn!(
            user_id = self.user_id,
            provider = %self.provider,
            stage = %self.stage,
            "OAuth callback failed: {error}"
        );
        error
    }

    /// Link the first Xero organization the code grants access to
    ///
    /// # Errors
    ///
    /// Returns the step that failed; nothing is persisted unless the
    /// failure happens after [`CallbackStage::Persisted`]
    pub async fn link_xero(
        mut self,
        xero: &XeroClient,
        database: &Database,
        provisioning: &ProvisioningClient,
        code: &str,
    ) -> Result<CallbackStage, CallbackError> {
        let response = xero
            .exchange_code(code)
            .await
            .map_err(|e| self.fail(exchange_error(e)))?;
        if !response.has_refresh_token() {
            return Err(self.fail(CallbackError::InvalidTokenData));
        }
        let Some(tokens) = response.into_tokens() else {
            return Err(self.fail(CallbackError::InvalidTokenData));
        };
        self.advance(CallbackStage::TokenExchanged);

        let connections = xero
            .list_connections(&tokens.access_token)
            .await
            .map_err(|e| self.fail(CallbackError::FetchOrgFailed(e)))?;
        let Some(first) = connections.into_iter().next() else {
            return Err(self.fail(CallbackError::NoOrganizations));
        };
        let organization = LinkedOrganization::from(first);
        self.advance(CallbackStage::OrgDiscovered);

        self.persist_and_provision(database, provisioning, &organization, &tokens)
            .await
    }

    /// Link the shop the code was issued for
    ///
    /// # Errors
    ///
    /// Returns the step that failed
    pub async fn link_shopify(
        mut self,
        shopify: &ShopifyClient,
        database: &Database,
        provisioning: &ProvisioningClient,
        shop: &str,
        code: &str,
    ) -> Result<CallbackStage, CallbackError> {
        let response: TokenResponse = shopify
            .exchange_code(shop, code)
            .await
            .map_err(|e| self.fail(exchange_error(e)))?;
        let Some(tokens) = response.into_tokens() else {
            return Err(self.fail(CallbackError::InvalidTokenData));
        };
        self.advance(CallbackStage::TokenExchanged);

        let organization = shopify.describe_shop(shop, &tokens.access_token).await;
        self.advance(CallbackStage::OrgDiscovered);

        self.persist_and_provision(database, provisioning, &organization, &tokens)
            .await
    }

    async fn persist_and_provision(
        mut self,
        database: &Database,
        provisioning: &ProvisioningClient,
        organization: &LinkedOrganization,
        tokens: &ProviderTokens,
    ) -> Result<CallbackStage, CallbackError> {
        let integration = IntegrationUpsert {
            provider: self.provider,
            tenant_id: &organization.id,
            tenant_name: &organization.name,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match database
                .save_connection(self.user_id, &integration, tokens)
                .await
            {
                Ok(()) => break,
                Err(e) if attempt < STORAGE_ATTEMPTS => {
                    warn!(user_id = self.user_id, "Saving connection failed, retrying: {e}");
                }
                Err(e) => return Err(self.fail(CallbackError::StorageFailed(e))),
            }
        }
        self.advance(CallbackStage::Persisted);

        if let Err(e) = provisioning.trigger(self.user_id, self.provider).await {
            warn!(
                user_id = self.user_id,
                provider = %self.provider,
                "Provisioning failed, connection kept: {e}"
            );
        }
        self.advance(CallbackStage::ProvisioningTriggered);

        info!(
            user_id = self.user_id,
            provider = %self.provider,
            tenant = %organization.name,
            "Connector linked"
        );
        self.advance(CallbackStage::Done);
        Ok(self.stage)
    }
}

fn exchange_error(error: ProviderError) -> CallbackError {
    match error {
        ProviderError::NotConfigured(_) => CallbackError::Unexpected(error.to_string()),
        ProviderError::InvalidResponse(_) => CallbackError::InvalidTokenData,
        other => CallbackError::TokenExchangeFailed(other),
    }
}
