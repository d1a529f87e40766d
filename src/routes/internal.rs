// ABOUTME: Internal credentials endpoint for trusted backend services
// ABOUTME: Bearer-key protected; refreshes expiring Xero tokens before handing them out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ring::digest;
use serde::Serialize;
use tracing::{info, warn};

use semantc_core::models::ConnectorProvider;

use crate::auth::bearer_token;
use crate::database::ProviderTokens;
use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;

/// Refresh Xero access tokens that expire within this many seconds
const REFRESH_LEEWAY_SECS: i64 = 60;

/// Decrypted credentials for one provider link
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    /// Owning user
    pub user_id: String,
    /// Provider
    pub provider: ConnectorProvider,
    /// Plaintext tokens
    #[serde(flatten)]
    pub tokens: ProviderTokens,
}

/// Internal routes
pub struct InternalRoutes;

impl InternalRoutes {
    /// Create the internal routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/internal/credentials/:user_id/:provider",
                get(Self::get_credentials),
            )
            .with_state(resources)
    }

    async fn get_credentials(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((user_id, provider)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        // Without a configured key the endpoint does not exist
        let Some(expected) = resources.config.internal_api_key.as_deref() else {
            return Err(AppError::not_found("Not found"));
        };
        if !bearer_token(&headers).is_some_and(|presented| keys_match(&presented, expected)) {
            warn!(%user_id, "Rejected internal credentials request");
            return Err(AppError::auth_invalid("Invalid internal API key"));
        }

        let provider = ConnectorProvider::from_str(&provider)?;
        let tokens = resources
            .database
            .get_provider_tokens(&user_id, provider)
            .await?
            .ok_or_else(|| AppError::not_found("No credentials for this provider"))?;

        let tokens = if provider == ConnectorProvider::Xero && tokens.expires_within(REFRESH_LEEWAY_SECS)
        {
            refresh_xero(&resources, &user_id, tokens).await?
        } else {
            tokens
        };

        Ok(Json(CredentialsResponse {
            user_id,
            provider,
            tokens,
        })
        .into_response())
    }
}

/// Swap an expiring Xero token pair and store the new pair encrypted
async fn refresh_xero(
    resources: &ServerResources,
    user_id: &str,
    current: ProviderTokens,
) -> AppResult<ProviderTokens> {
    let Some(refresh_token) = current.refresh_token.as_deref() else {
        return Ok(current);
    };

    let response = resources
        .xero
        .refresh(refresh_token)
        .await
        .map_err(|e| AppError::external_service("xero", format!("Token refresh failed: {e}")))?;
    let mut refreshed = response
        .into_tokens()
        .ok_or_else(|| AppError::external_service("xero", "Refresh returned no access token"))?;
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = current.refresh_token;
    }

    resources
        .database
        .update_provider_tokens(user_id, ConnectorProvider::Xero, &refreshed)
        .await?;
    info!(user_id, "Refreshed Xero access token");
    Ok(refreshed)
}

/// Compare digests so the comparison time does not track the key's prefix
fn keys_match(presented: &str, expected: &str) -> bool {
    digest::digest(&digest::SHA256, presented.as_bytes()).as_ref()
        == digest::digest(&digest::SHA256, expected.as_bytes()).as_ref()
}
