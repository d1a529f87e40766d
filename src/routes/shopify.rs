// ABOUTME: Shopify OAuth routes: install redirect and the callback that links a shop
// ABOUTME: Validates shop domain and callback HMAC before any token exchange
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use semantc_core::models::ConnectorProvider;

use super::{callback_redirect, state_matches};
use crate::auth;
use crate::errors::AppError;
use crate::oauth::shopify::is_valid_shop_domain;
use crate::oauth::{generate_state, CallbackError, CallbackFlow, CallbackOutcome, CallbackStage};
use crate::resources::ServerResources;
use crate::security::cookies::set_oauth_state_cookie;

/// Query for the install redirect
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    /// `{name}.myshopify.com`
    pub shop: Option<String>,
}

/// Shopify OAuth routes
pub struct ShopifyRoutes;

impl ShopifyRoutes {
    /// Create the Shopify routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/oauth/shopify/authorize", get(Self::handle_authorize))
            .route("/api/oauth/shopify/callback", get(Self::handle_callback))
            .with_state(resources)
    }

    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<AuthorizeQuery>,
    ) -> Result<Response, AppError> {
        let user = auth::authenticate(&headers, resources.verifier.as_ref()).await?;

        let shop = query
            .shop
            .as_deref()
            .map(str::trim)
            .filter(|shop| is_valid_shop_domain(shop))
            .ok_or_else(|| AppError::invalid_input("shop must be a *.myshopify.com domain"))?;

        let state = generate_state();
        let url = resources
            .shopify
            .authorize_url(shop, &state)
            .map_err(|e| AppError::config(e.to_string()))?;

        let mut response_headers = HeaderMap::new();
        set_oauth_state_cookie(&mut response_headers, &state, resources.config.secure_cookies());
        info!(user_id = %user.user_id, shop, "Starting Shopify authorization");
        Ok((response_headers, Redirect::to(&url)).into_response())
    }

    /// Finish a Shopify install; the raw pair list is kept for HMAC verification
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(params): Query<Vec<(String, String)>>,
    ) -> Response {
        let result = Self::link(&resources, &headers, &params).await;
        callback_redirect(
            &CallbackOutcome::from(result),
            &resources.config.base_url,
            resources.config.secure_cookies(),
        )
    }

    async fn link(
        resources: &ServerResources,
        headers: &HeaderMap,
        params: &[(String, String)],
    ) -> Result<CallbackStage, CallbackError> {
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .filter(|v| !v.is_empty())
        };

        let (Some(code), Some(shop)) = (param("code"), param("shop")) else {
            return Err(CallbackError::MissingParams);
        };
        if !is_valid_shop_domain(shop) {
            warn!(shop, "Shopify callback with invalid shop domain");
            return Err(CallbackError::InvalidShop);
        }
        if resources.shopify.verifies_hmac() && !resources.shopify.verify_hmac(params) {
            warn!(shop, "Shopify callback HMAC did not verify");
            return Err(CallbackError::InvalidHmac);
        }
        if !state_matches(headers, param("state")) {
            warn!(shop, "Shopify callback state mismatch");
            return Err(CallbackError::InvalidState);
        }

        let user = auth::authenticate(headers, resources.verifier.as_ref())
            .await
            .map_err(|e| {
                warn!(shop, "Shopify callback without a valid session: {e}");
                CallbackError::Unauthenticated
            })?;

        CallbackFlow::new(ConnectorProvider::Shopify, &user.user_id)
            .link_shopify(
                &resources.shopify,
                &resources.database,
                &resources.provisioning,
                shop,
                code,
            )
            .await
    }
}
