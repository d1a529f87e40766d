// ABOUTME: Route module organization for the Semantc gateway HTTP endpoints
// ABOUTME: One module per domain; provider OAuth routes are compiled per feature flag
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! HTTP routes
//!
//! Each domain module exposes a `*Routes::routes` constructor returning a
//! [`axum::Router`] already bound to the shared
//! [`ServerResources`](crate::resources::ServerResources). Handlers stay thin
//! and delegate to the database, OAuth and chat layers.

// ═══════════════════════════════════════════════════════════════
// ALWAYS ENABLED - Core infrastructure
// ═══════════════════════════════════════════════════════════════

/// Liveness and datastore health
pub mod health;

/// Connector status and disconnect
pub mod connectors;

/// Chat relay, conversation history and processing state
pub mod chat;

/// Credentials handed to trusted backend services
pub mod internal;

// ═══════════════════════════════════════════════════════════════
// PROVIDER FEATURES
// ═══════════════════════════════════════════════════════════════

/// Xero authorize and callback routes
#[cfg(feature = "provider-xero")]
pub mod xero;

/// Shopify authorize and callback routes
#[cfg(feature = "provider-shopify")]
pub mod shopify;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};

use crate::constants;
use crate::oauth::CallbackOutcome;
use crate::security::cookies::{clear_oauth_state_cookie, get_cookie_value};

/// Redirect for a finished OAuth callback, clearing the state cookie
pub(crate) fn callback_redirect(
    outcome: &CallbackOutcome,
    base_url: &str,
    secure_cookies: bool,
) -> Response {
    let mut headers = HeaderMap::new();
    clear_oauth_state_cookie(&mut headers, secure_cookies);
    (headers, Redirect::to(&outcome.location(base_url))).into_response()
}

/// True unless an `oauth_state` cookie was issued and the query `state` differs
pub(crate) fn state_matches(headers: &HeaderMap, state: Option<&str>) -> bool {
    match get_cookie_value(headers, constants::cookies::OAUTH_STATE) {
        Some(expected) if !expected.is_empty() => state == Some(expected.as_str()),
        _ => true,
    }
}
