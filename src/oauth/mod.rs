// ABOUTME: OAuth connector flows for Xero and Shopify
// ABOUTME: Provider clients, the shared token response type and the callback state machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # OAuth connectors
//!
//! Each provider client knows how to build its authorize URL, exchange an
//! authorization code and discover the organization being linked. The
//! [`callback`] module drives a client through the link flow and turns every
//! outcome into a redirect.

/// Callback state machine and redirect mapping
pub mod callback;
/// Shopify Admin OAuth client
pub mod shopify;
/// Xero identity and connections client
pub mod xero;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

pub use callback::{CallbackError, CallbackFlow, CallbackOutcome, CallbackStage};
pub use shopify::ShopifyClient;
pub use xero::XeroClient;

use crate::database::ProviderTokens;

/// Failure talking to a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Client id, secret or redirect URI missing
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    /// Request never produced a response
    #[error("request failed: {0}")]
    Transport(String),
    /// Provider answered with a non-success status
    #[error("provider returned status {status}")]
    Status {
        /// HTTP status
        status: u16,
    },
    /// Body could not be parsed or lacked required fields
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Token endpoint response shared by both providers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Refresh token (Xero only)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Token type
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted scope
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// True when a non-empty refresh token was issued
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Convert to storable tokens, stamping the absolute expiry
    ///
    /// Returns `None` when no access token was issued.
    #[must_use]
    pub fn into_tokens(self) -> Option<ProviderTokens> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(ProviderTokens {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at: self.expires_in.map(|secs| Utc::now().timestamp() + secs),
            token_type: self.token_type,
            scope: self.scope,
        })
    }
}

/// Organization (Xero tenant or Shopify shop) a link is made against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedOrganization {
    /// Tenant id or shop domain
    pub id: String,
    /// Display name
    pub name: String,
}

/// Random URL-safe value for the OAuth `state` parameter
#[must_use]
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
