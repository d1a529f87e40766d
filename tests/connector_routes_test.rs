// ABOUTME: Integration tests for connector status, disconnect and the internal credentials API
// ABOUTME: Seeds links directly in the database and drives the full router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use common::{
    create_test_server_resources, mint_session_token, spawn_mock, test_config, CallLog,
};
use helpers::axum_test::AxumTestRequest;
use semantc_core::models::ConnectorProvider;
use semantc_server::config::environment::{ServerConfig, XeroConfig};
use semantc_server::database::{Database, IntegrationUpsert, ProviderTokens};
use semantc_server::resources::ServerResources;
use semantc_server::server::build_router;

const INTERNAL_KEY: &str = "internal-service-key";

async fn record_call(State(log): State<CallLog>, body: String) -> Json<Value> {
    let value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    log.record(value);
    Json(json!({
        "access_token": "refreshed-access",
        "expires_in": 1800,
        "token_type": "Bearer"
    }))
}

/// Mock serving both the provisioning webhook and the Xero token endpoint
async fn spawn_upstream() -> (String, CallLog, CallLog) {
    let provision_log = CallLog::default();
    let token_log = CallLog::default();
    let router = Router::new()
        .route("/provision", post(record_call).with_state(provision_log.clone()))
        .route("/connect/token", post(record_call).with_state(token_log.clone()));
    let base = spawn_mock(router).await;
    (base, provision_log, token_log)
}

struct Harness {
    resources: Arc<ServerResources>,
    router: Router,
    provision_calls: CallLog,
    token_calls: CallLog,
}

async fn setup(internal_api_key: Option<&str>) -> Harness {
    let (base, provision_calls, token_calls) = spawn_upstream().await;
    let mut config: ServerConfig = test_config();
    config.provisioning.url = format!("{base}/provision");
    config.internal_api_key = internal_api_key.map(ToOwned::to_owned);
    config.xero = XeroConfig {
        client_id: Some("xero-client".to_owned()),
        client_secret: Some("xero-secret".to_owned()),
        redirect_uri: Some("https://app.semantc.test/api/oauth/xero/callback".to_owned()),
        token_url: format!("{base}/connect/token"),
        ..XeroConfig::default()
    };

    let resources = create_test_server_resources(config).await;
    let router = build_router(&resources);
    Harness {
        resources,
        router,
        provision_calls,
        token_calls,
    }
}

fn tokens(access: &str, refresh: Option<&str>, expires_at: Option<i64>) -> ProviderTokens {
    ProviderTokens {
        access_token: access.to_owned(),
        refresh_token: refresh.map(ToOwned::to_owned),
        expires_at,
        token_type: Some("Bearer".to_owned()),
        scope: None,
    }
}

async fn link(
    database: &Database,
    user_id: &str,
    provider: ConnectorProvider,
    tenant: &str,
    tokens: &ProviderTokens,
) {
    database
        .save_connection(
            user_id,
            &IntegrationUpsert {
                provider,
                tenant_id: tenant,
                tenant_name: tenant,
            },
            tokens,
        )
        .await
        .unwrap();
}

// ============================================================================
// Connector Status
// ============================================================================

#[tokio::test]
async fn test_status_requires_session() {
    let harness = setup(None).await;

    let response = AxumTestRequest::get("/api/connector-status")
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>(), json!({ "active": false }));
}

#[tokio::test]
async fn test_status_for_user_without_links() {
    let harness = setup(None).await;

    let response = AxumTestRequest::get("/api/check-connector")
        .bearer(&mint_session_token("nobody"))
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["active"], false);
    assert_eq!(body["integrations"]["xero"], json!({}));
    assert_eq!(body["integrations"]["shopify"], json!({}));
}

#[tokio::test]
async fn test_status_reports_linked_providers() {
    let harness = setup(None).await;
    link(
        &harness.resources.database,
        "user-1",
        ConnectorProvider::Shopify,
        "acme.myshopify.com",
        &tokens("shpat", None, None),
    )
    .await;

    let response = AxumTestRequest::get("/api/connector-status")
        .bearer(&mint_session_token("user-1"))
        .send(harness.router.clone())
        .await;

    let body: Value = response.json();
    assert_eq!(body["active"], true);
    assert_eq!(body["integrations"]["shopify"]["active"], true);
    assert_eq!(body["integrations"]["shopify"]["tenantId"], "acme.myshopify.com");
    assert_eq!(body["integrations"]["xero"], json!({}));
    // Credentials never leave through the status endpoint
    assert!(!response.text().contains("shpat"));
}

// ============================================================================
// Disconnect
// ============================================================================

#[tokio::test]
async fn test_disconnect_removes_link_and_credentials() {
    let harness = setup(None).await;
    let database = &harness.resources.database;
    link(
        database,
        "user-2",
        ConnectorProvider::Xero,
        "tenant-x",
        &tokens("xa", Some("xr"), None),
    )
    .await;
    link(
        database,
        "user-2",
        ConnectorProvider::Shopify,
        "acme.myshopify.com",
        &tokens("sa", None, None),
    )
    .await;

    let response = AxumTestRequest::post("/api/disconnect/xero")
        .bearer(&mint_session_token("user-2"))
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": true, "provider": "xero", "wasConnected": true })
    );

    let connector = database.get_connector("user-2").await.unwrap().unwrap();
    assert!(connector.integration(ConnectorProvider::Xero).is_none());
    assert!(connector.integration(ConnectorProvider::Shopify).is_some());
    assert!(connector.active);
    assert!(database
        .get_stored_credentials("user-2", ConnectorProvider::Xero)
        .await
        .unwrap()
        .is_none());

    assert_eq!(harness.provision_calls.count(), 1);
    let call = &harness.provision_calls.all()[0];
    assert_eq!(call["action"], "destroy");
    assert_eq!(call["connectorType"], "xero");
    assert_eq!(call["userId"], "user-2");
}

#[tokio::test]
async fn test_disconnect_last_provider_clears_active_flag() {
    let harness = setup(None).await;
    let database = &harness.resources.database;
    link(
        database,
        "user-3",
        ConnectorProvider::Shopify,
        "acme.myshopify.com",
        &tokens("sa", None, None),
    )
    .await;

    AxumTestRequest::post("/api/disconnect/shopify")
        .bearer(&mint_session_token("user-3"))
        .send(harness.router.clone())
        .await;

    let status = AxumTestRequest::get("/api/connector-status")
        .bearer(&mint_session_token("user-3"))
        .send(harness.router.clone())
        .await;
    assert_eq!(status.json::<Value>()["active"], false);
}

#[tokio::test]
async fn test_disconnect_unlinked_provider_is_noop() {
    let harness = setup(None).await;

    let response = AxumTestRequest::post("/api/disconnect/shopify")
        .bearer(&mint_session_token("user-4"))
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["wasConnected"], false);
    assert_eq!(harness.provision_calls.count(), 0);
}

#[tokio::test]
async fn test_disconnect_rejects_unknown_provider() {
    let harness = setup(None).await;

    let response = AxumTestRequest::post("/api/disconnect/quickbooks")
        .bearer(&mint_session_token("user-5"))
        .send(harness.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = AxumTestRequest::post("/api/disconnect/xero")
        .send(harness.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Internal Credentials
// ============================================================================

#[tokio::test]
async fn test_internal_api_absent_without_key() {
    let harness = setup(None).await;

    let response = AxumTestRequest::get("/internal/credentials/user-6/xero")
        .bearer("anything")
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_internal_api_rejects_wrong_key() {
    let harness = setup(Some(INTERNAL_KEY)).await;

    let response = AxumTestRequest::get("/internal/credentials/user-6/xero")
        .bearer("wrong-key")
        .send(harness.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = AxumTestRequest::get("/internal/credentials/user-6/xero")
        .send(harness.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_internal_api_returns_decrypted_tokens() {
    let harness = setup(Some(INTERNAL_KEY)).await;
    let expires_at = Utc::now().timestamp() + 3600;
    link(
        &harness.resources.database,
        "user-7",
        ConnectorProvider::Xero,
        "tenant-7",
        &tokens("plain-access", Some("plain-refresh"), Some(expires_at)),
    )
    .await;

    let response = AxumTestRequest::get("/internal/credentials/user-7/xero")
        .bearer(INTERNAL_KEY)
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["userId"], "user-7");
    assert_eq!(body["provider"], "xero");
    assert_eq!(body["accessToken"], "plain-access");
    assert_eq!(body["refreshToken"], "plain-refresh");
    assert_eq!(body["expiresAt"], expires_at);
    assert_eq!(harness.token_calls.count(), 0);

    let missing = AxumTestRequest::get("/internal/credentials/user-7/shopify")
        .bearer(INTERNAL_KEY)
        .send(harness.router.clone())
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_internal_api_refreshes_expiring_xero_token() {
    let harness = setup(Some(INTERNAL_KEY)).await;
    let database = &harness.resources.database;
    link(
        database,
        "user-8",
        ConnectorProvider::Xero,
        "tenant-8",
        &tokens("stale-access", Some("old-refresh"), Some(Utc::now().timestamp() - 10)),
    )
    .await;

    let response = AxumTestRequest::get("/internal/credentials/user-8/xero")
        .bearer(INTERNAL_KEY)
        .send(harness.router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["accessToken"], "refreshed-access");
    // No new refresh token was issued, so the old one is kept
    assert_eq!(body["refreshToken"], "old-refresh");

    assert_eq!(harness.token_calls.count(), 1);
    let form = harness.token_calls.all()[0].as_str().unwrap().to_owned();
    assert!(form.contains("grant_type=refresh_token"));
    assert!(form.contains("refresh_token=old-refresh"));

    let stored = database
        .get_provider_tokens("user-8", ConnectorProvider::Xero)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "refreshed-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
}
