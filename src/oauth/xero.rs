// ABOUTME: Xero OAuth 2.0 client for authorize URLs, code exchange, refresh and tenant discovery
// ABOUTME: Talks to identity.xero.com and api.xero.com (both overridable for tests)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{LinkedOrganization, ProviderError, TokenResponse};
use crate::config::environment::XeroConfig;
use crate::constants;

/// One entry of `GET /connections`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XeroConnection {
    /// Organization id used as `xero-tenant-id`
    pub tenant_id: String,
    /// Organization display name
    #[serde(default)]
    pub tenant_name: Option<String>,
    /// `ORGANISATION` or `PRACTICE`
    #[serde(default)]
    pub tenant_type: Option<String>,
}

impl From<XeroConnection> for LinkedOrganization {
    fn from(connection: XeroConnection) -> Self {
        Self {
            name: connection
                .tenant_name
                .unwrap_or_else(|| connection.tenant_id.clone()),
            id: connection.tenant_id,
        }
    }
}

/// Xero identity and connections client
#[derive(Clone)]
pub struct XeroClient {
    config: XeroConfig,
    http: reqwest::Client,
}

impl XeroClient {
    /// Create a client
    #[must_use]
    pub const fn new(config: XeroConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn credentials(&self) -> Result<(&str, &str, &str), ProviderError> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or(ProviderError::NotConfigured("XERO_CLIENT_ID"))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or(ProviderError::NotConfigured("XERO_CLIENT_SECRET"))?;
        let redirect_uri = self
            .config
            .redirect_uri
            .as_deref()
            .ok_or(ProviderError::NotConfigured("XERO_REDIRECT_URI"))?;
        Ok((client_id, client_secret, redirect_uri))
    }

    /// Browser URL that starts the consent flow
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when client id or redirect URI are missing
    pub fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let (client_id, _, redirect_uri) = self.credentials()?;
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", constants::xero::SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::InvalidResponse(format!("bad authorize URL: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code (form-encoded `authorization_code` grant)
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ProviderError> {
        let (client_id, client_secret, redirect_uri) = self.credentials()?;
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .await
    }

    /// Trade a refresh token for a new token pair
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        let (client_id, client_secret, _) = self.credentials()?;
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Xero token endpoint rejected the request");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    /// Organizations the access token can reach, in the order Xero returns them
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unparseable body
    pub async fn list_connections(
        &self,
        access_token: &str,
    ) -> Result<Vec<XeroConnection>, ProviderError> {
        let response = self
            .http
            .get(&self.config.connections_url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let connections = response.json::<Vec<XeroConnection>>().await?;
        debug!(count = connections.len(), "Fetched Xero connections");
        Ok(connections)
    }
}
