// ABOUTME: Xero OAuth routes: authorize redirect and the callback that links an organization
// ABOUTME: Every callback outcome is a redirect to the integrations page or the login page
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::{info, warn};

use semantc_core::models::ConnectorProvider;

use super::{callback_redirect, state_matches};
use crate::auth;
use crate::errors::AppError;
use crate::oauth::{generate_state, CallbackError, CallbackFlow, CallbackOutcome, CallbackStage};
use crate::resources::ServerResources;
use crate::security::cookies::set_oauth_state_cookie;

/// Xero OAuth routes
pub struct XeroRoutes;

impl XeroRoutes {
    /// Create the Xero routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/oauth/xero/authorize", get(Self::handle_authorize))
            .route("/api/oauth/xero/callback", get(Self::handle_callback))
            .with_state(resources)
    }

    /// Send a signed-in user to Xero's consent screen
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = auth::authenticate(&headers, resources.verifier.as_ref()).await?;

        let state = generate_state();
        let url = resources
            .xero
            .authorize_url(&state)
            .map_err(|e| AppError::config(e.to_string()))?;

        let mut response_headers = HeaderMap::new();
        set_oauth_state_cookie(&mut response_headers, &state, resources.config.secure_cookies());
        info!(user_id = %user.user_id, "Starting Xero authorization");
        Ok((response_headers, Redirect::to(&url)).into_response())
    }

    /// Finish a Xero authorization
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
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
        params: &HashMap<String, String>,
    ) -> Result<CallbackStage, CallbackError> {
        if let Some(provider_error) = params.get("error") {
            warn!(error = %provider_error, "Xero returned an authorization error");
        }
        let code = params
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or(CallbackError::NoCode)?;

        if !state_matches(headers, params.get("state").map(String::as_str)) {
            warn!("Xero callback state mismatch");
            return Err(CallbackError::InvalidState);
        }

        let user = auth::authenticate(headers, resources.verifier.as_ref())
            .await
            .map_err(|e| {
                warn!("Xero callback without a valid session: {e}");
                CallbackError::Unauthenticated
            })?;

        CallbackFlow::new(ConnectorProvider::Xero, &user.user_id)
            .link_xero(
                &resources.xero,
                &resources.database,
                &resources.provisioning,
                code,
            )
            .await
    }
}
