// ABOUTME: Connector status and disconnect endpoints for the integrations page
// ABOUTME: Status answers {active:false} on any failure so the UI can render a disconnected state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use semantc_core::models::{ConnectorProvider, ConnectorRecord};

use crate::auth;
use crate::errors::AppError;
use crate::resources::ServerResources;

/// Body of a successful disconnect
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponse {
    /// Always true
    pub success: bool,
    /// Provider that was disconnected
    pub provider: ConnectorProvider,
    /// Whether a link existed before the call
    pub was_connected: bool,
}

/// Connector routes
pub struct ConnectorRoutes;

impl ConnectorRoutes {
    /// Create the connector routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/connector-status", get(Self::handle_status))
            .route("/api/check-connector", get(Self::handle_status))
            .route("/api/disconnect/:provider", post(Self::handle_disconnect))
            .with_state(resources)
    }

    async fn handle_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let Ok(user) = auth::authenticate(&headers, resources.verifier.as_ref()).await else {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "active": false }))).into_response();
        };

        match resources.database.get_connector(&user.user_id).await {
            Ok(connector) => Json(status_body(connector.as_ref())).into_response(),
            Err(e) => {
                error!(user_id = %user.user_id, "Failed to load connector status: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "active": false })),
                )
                    .into_response()
            }
        }
    }

    async fn handle_disconnect(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(provider): Path<String>,
    ) -> Result<Response, AppError> {
        let user = auth::authenticate(&headers, resources.verifier.as_ref()).await?;
        let provider = ConnectorProvider::from_str(&provider)?;

        let was_connected = resources
            .database
            .disconnect_provider(&user.user_id, provider)
            .await?;
        info!(user_id = %user.user_id, %provider, was_connected, "Connector disconnected");

        if was_connected {
            resources.provisioning.destroy(&user.user_id, provider).await;
        }

        Ok(Json(DisconnectResponse {
            success: true,
            provider,
            was_connected,
        })
        .into_response())
    }
}

/// `{active, integrations: {xero: {...}, shopify: {...}}}`; unlinked providers map to `{}`
#[must_use]
pub fn status_body(connector: Option<&ConnectorRecord>) -> Value {
    let mut integrations = Map::new();
    for provider in ConnectorProvider::ALL {
        let entry = connector
            .and_then(|c| c.integration(provider))
            .and_then(|integration| serde_json::to_value(integration).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));
        integrations.insert(provider.as_str().to_owned(), entry);
    }

    json!({
        "active": connector.is_some_and(ConnectorRecord::any_active),
        "integrations": integrations,
    })
}
