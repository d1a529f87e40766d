// ABOUTME: Shopify Admin OAuth client for install URLs, HMAC checks, code exchange and shop lookup
// ABOUTME: Shop hosts are validated against *.myshopify.com before any request is made
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::sync::OnceLock;

use regex::Regex;
use ring::hmac;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{LinkedOrganization, ProviderError, TokenResponse};
use crate::config::environment::ShopifyConfig;
use crate::constants;

fn shop_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-]*\.myshopify\.com$").ok())
        .as_ref()
}

/// True if `shop` is a bare `*.myshopify.com` host
#[must_use]
pub fn is_valid_shop_domain(shop: &str) -> bool {
    shop_pattern().is_some_and(|pattern| pattern.is_match(shop))
}

#[derive(Debug, Deserialize)]
struct ShopEnvelope {
    shop: ShopDetails,
}

#[derive(Debug, Deserialize)]
struct ShopDetails {
    #[serde(default)]
    name: Option<String>,
}

/// Shopify Admin OAuth client
#[derive(Clone)]
pub struct ShopifyClient {
    config: ShopifyConfig,
    http: reqwest::Client,
}

impl ShopifyClient {
    /// Create a client
    #[must_use]
    pub const fn new(config: ShopifyConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Whether callbacks must carry a valid `hmac`
    #[must_use]
    pub const fn verifies_hmac(&self) -> bool {
        self.config.verify_hmac
    }

    fn client_id(&self) -> Result<&str, ProviderError> {
        self.config
            .client_id
            .as_deref()
            .ok_or(ProviderError::NotConfigured("SHOPIFY_CLIENT_ID"))
    }

    fn client_secret(&self) -> Result<&str, ProviderError> {
        self.config
            .client_secret
            .as_deref()
            .ok_or(ProviderError::NotConfigured("SHOPIFY_CLIENT_SECRET"))
    }

    fn shop_base(&self, shop: &str) -> String {
        self.config.api_base_override.as_ref().map_or_else(
            || format!("https://{shop}"),
            |base| base.trim_end_matches('/').to_owned(),
        )
    }

    /// Install URL for `shop`
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when client id or redirect URI are missing
    pub fn authorize_url(&self, shop: &str, state: &str) -> Result<String, ProviderError> {
        let client_id = self.client_id()?;
        let redirect_uri = self
            .config
            .redirect_uri
            .as_deref()
            .ok_or(ProviderError::NotConfigured("SHOPIFY_REDIRECT_URI"))?;

        let url = Url::parse_with_params(
            &format!("https://{shop}/admin/oauth/authorize"),
            &[
                ("client_id", client_id),
                ("scope", constants::shopify::SCOPES),
                ("redirect_uri", redirect_uri),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::InvalidResponse(format!("bad authorize URL: {e}")))?;
        Ok(url.into())
    }

    /// Check the `hmac` Shopify appends to callback query strings
    ///
    /// Every parameter except `hmac` and `signature` is sorted by name,
    /// joined as `k=v&...` and signed with the client secret.
    #[must_use]
    pub fn verify_hmac(&self, params: &[(String, String)]) -> bool {
        let Ok(secret) = self.client_secret() else {
            return false;
        };
        let Some(provided) = params
            .iter()
            .find(|(k, _)| k == "hmac")
            .and_then(|(_, v)| hex::decode(v).ok())
        else {
            return false;
        };

        let message = signing_message(params);
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        hmac::verify(&key, message.as_bytes(), &provided).is_ok()
    }

    /// Exchange an authorization code for a permanent offline token
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn exchange_code(&self, shop: &str, code: &str) -> Result<TokenResponse, ProviderError> {
        let body = json!({
            "client_id": self.client_id()?,
            "client_secret": self.client_secret()?,
            "code": code,
        });

        let response = self
            .http
            .post(format!("{}/admin/oauth/access_token", self.shop_base(shop)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(shop, status = status.as_u16(), "Shopify token exchange rejected");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    /// The shop being linked, named from `shop.json` when that lookup succeeds
    pub async fn describe_shop(&self, shop: &str, access_token: &str) -> LinkedOrganization {
        let url = format!(
            "{}/admin/api/{}/shop.json",
            self.shop_base(shop),
            constants::shopify::API_VERSION
        );
        let name = match self
            .http
            .get(url)
            .header("X-Shopify-Access-Token", access_token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response
                .json::<ShopEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.shop.name),
            Ok(response) => {
                debug!(shop, status = response.status().as_u16(), "Shop lookup failed");
                None
            }
            Err(e) => {
                debug!(shop, "Shop lookup failed: {e}");
                None
            }
        };

        LinkedOrganization {
            id: shop.to_owned(),
            name: name.unwrap_or_else(|| shop.to_owned()),
        }
    }
}

fn signing_message(params: &[(String, String)]) -> String {
    let mut pairs: Vec<_> = params
        .iter()
        .filter(|(k, _)| k != "hmac" && k != "signature")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    pairs.sort();
    pairs.join("&")
}

/// Hex HMAC-SHA256 of a parameter set, as Shopify computes it
#[must_use]
pub fn sign_params(secret: &str, params: &[(String, String)]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, signing_message(params).as_bytes()).as_ref())
}
