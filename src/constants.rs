// ABOUTME: Application constants for upstream endpoints, timeouts and limits
// ABOUTME: Defaults used when the corresponding environment variable is unset
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! Default values grouped by concern

/// Server defaults
pub mod server {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 3000;
    /// Default public base URL used for redirects
    pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
    /// Default `SQLite` database location
    pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/semantc.db";
    /// Whole-request timeout for ordinary routes (covers the chat relay)
    pub const REQUEST_TIMEOUT_SECS: u64 = 90;
}

/// Cookie names
pub mod cookies {
    /// HTTP-only cookie carrying the identity token
    pub const SESSION: &str = "session";
    /// CSRF state for the OAuth authorize round-trip
    pub const OAUTH_STATE: &str = "oauth_state";
    /// Lifetime of the OAuth state cookie
    pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;
}

/// Redirect targets used by the OAuth callbacks
pub mod redirects {
    /// Login page for unauthenticated callbacks
    pub const LOGIN_PATH: &str = "/login";
    /// Integrations page receiving `status` or `error`
    pub const INTEGRATIONS_PATH: &str = "/integrations";
}

/// Session verification
pub mod session {
    /// Google public keys for Firebase ID tokens
    pub const FIREBASE_JWKS_URL: &str =
        "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
    /// Issuer prefix; the project id is appended
    pub const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
    /// How long fetched signing keys are trusted
    pub const JWKS_CACHE_TTL_SECS: u64 = 3600;
}

/// Xero endpoints and scopes
pub mod xero {
    /// Browser authorize endpoint
    pub const AUTHORIZE_URL: &str = "https://login.xero.com/identity/connect/authorize";
    /// Token endpoint
    pub const TOKEN_URL: &str = "https://identity.xero.com/connect/token";
    /// Tenant listing endpoint
    pub const CONNECTIONS_URL: &str = "https://api.xero.com/connections";
    /// Read-only accounting scopes plus a refresh token
    pub const SCOPES: &str = "openid profile email accounting.transactions.read \
        accounting.reports.read accounting.reports.tenninetynine.read accounting.journals.read \
        accounting.settings.read accounting.contacts.read accounting.attachments.read \
        accounting.budgets.read offline_access";
}

/// Shopify scopes
pub mod shopify {
    /// Read scopes requested at install time
    pub const SCOPES: &str = "read_products,read_orders,read_inventory,read_fulfillments,\
        read_customers,read_analytics,read_reports,read_price_rules,read_marketing_events,\
        read_merchant_managed_fulfillment_orders,read_shopify_payments_payouts";
    /// Admin API version used for the shop lookup
    pub const API_VERSION: &str = "2024-01";
}

/// Provisioning webhook
pub mod provisioning {
    /// Default webhook location
    pub const DEFAULT_URL: &str =
        "https://us-central1-semantc-sandbox.cloudfunctions.net/provision-connector";
    /// Xero request timeout
    pub const XERO_TIMEOUT_SECS: u64 = 30;
    /// Shopify request timeout (store provisioning is slow)
    pub const SHOPIFY_TIMEOUT_SECS: u64 = 150;
    /// Retries after the first attempt
    pub const MAX_RETRIES: u32 = 3;
    /// Fixed delay between attempts
    pub const RETRY_DELAY_MS: u64 = 1000;
}

/// Chat backend
pub mod chat {
    /// Relay timeout
    pub const BACKEND_TIMEOUT_SECS: u64 = 60;
    /// Backend chat path appended to `CLOUD_RUN_API_URL`
    pub const CHAT_PATH: &str = "/api/chat";
    /// Title used when the first message is empty
    pub const DEFAULT_TITLE: &str = "New Chat";
}

/// Rate limiting
pub mod rate_limit {
    /// POST requests allowed per window
    pub const MAX_REQUESTS: u32 = 50;
    /// Window length
    pub const WINDOW_SECS: u64 = 3600;
    /// Key used when no client address is known
    pub const UNKNOWN_CLIENT: &str = "no-ip";
}
