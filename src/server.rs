// ABOUTME: HTTP server assembly: route registration, middleware stack and graceful shutdown
// ABOUTME: Provider OAuth routes are registered per enabled feature
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, warn, Level};

use crate::config::environment::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::middleware::{limit_post_requests, RateLimiter};
use crate::resources::ServerResources;
use crate::routes::chat::ChatRoutes;
use crate::routes::connectors::ConnectorRoutes;
use crate::routes::health::HealthRoutes;
use crate::routes::internal::InternalRoutes;
#[cfg(feature = "provider-shopify")]
use crate::routes::shopify::ShopifyRoutes;
#[cfg(feature = "provider-xero")]
use crate::routes::xero::XeroRoutes;

/// Build the full application router with every middleware layer applied
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    // ═══════════════════════════════════════════════════════════════
    // ROUTES
    // ═══════════════════════════════════════════════════════════════

    let config = &resources.config;

    let api = Router::new()
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .merge(ConnectorRoutes::routes(Arc::clone(resources)))
        .merge(ChatRoutes::routes(Arc::clone(resources)))
        .merge(InternalRoutes::routes(Arc::clone(resources)))
        .layer(TimeoutLayer::new(config.request_timeout));

    // Callbacks provision inline, so they may run as long as every attempt
    let oauth = Router::new();

    #[cfg(feature = "provider-xero")]
    let oauth = oauth.merge(XeroRoutes::routes(Arc::clone(resources)));

    #[cfg(feature = "provider-shopify")]
    let oauth = oauth.merge(ShopifyRoutes::routes(Arc::clone(resources)));

    let oauth = oauth.layer(TimeoutLayer::new(
        config
            .request_timeout
            .saturating_add(config.provisioning.worst_case()),
    ));

    let app = api.merge(oauth);

    // ═══════════════════════════════════════════════════════════════
    // MIDDLEWARE (outermost last)
    // ═══════════════════════════════════════════════════════════════

    let limiter = RateLimiter::new(
        Arc::clone(&resources.rate_limit_store),
        config.rate_limit,
        !config.environment.is_development(),
    );

    app.layer(from_fn_with_state(limiter, limit_post_requests))
        .layer(setup_cors(config))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Browser calls come from the app origin only, with cookies
fn setup_cors(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = HeaderValue::from_str(&config.base_url)
        .map_or_else(
            |_| {
                warn!(base_url = %config.base_url, "BASE_URL is not a valid origin; CORS disabled");
                Vec::new()
            },
            |origin| vec![origin],
        );

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Bind and serve until SIGINT or SIGTERM
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails
pub async fn serve(resources: Arc<ServerResources>) -> AppResult<()> {
    let port = resources.config.http_port;
    let app = build_router(&resources);
    spawn_rate_limit_purge(&resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!(
        "HTTP server listening on http://{addr} ({})",
        resources.config.environment.as_str()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::internal(format!("Transport error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

/// Periodically drop expired rate limit windows
fn spawn_rate_limit_purge(resources: &Arc<ServerResources>) {
    let store = Arc::clone(&resources.rate_limit_store);
    let window = resources.config.rate_limit.window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            store.purge_expired(window);
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
