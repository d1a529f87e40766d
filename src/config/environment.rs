// ABOUTME: Environment-based configuration for the gateway
// ABOUTME: Reads every setting from process environment with typed defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Environment configuration
//!
//! All settings come from environment variables. There is no config file;
//! the binary layers a couple of `clap` overrides on top of
//! [`ServerConfig::from_env`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::errors::{AppError, AppResult};

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development: rate limiter counts but never rejects
    #[default]
    Development,
    /// Production
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse a loose environment name, defaulting to development
    #[must_use]
    pub fn from_str_or_default(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// True for local development
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse a format name, defaulting to pretty
    #[must_use]
    pub fn from_str_or_default(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Which session verifier to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionVerifierKind {
    /// Firebase ID tokens checked against Google's JWKS
    #[default]
    Firebase,
    /// HS256 tokens signed with `SESSION_JWT_SECRET`
    SharedSecret,
}

/// Session verification settings
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Verifier implementation
    pub verifier: SessionVerifierKind,
    /// Firebase project id (audience and issuer suffix)
    pub firebase_project_id: Option<String>,
    /// Shared secret for the HS256 verifier
    pub jwt_secret: Option<String>,
    /// JWKS location for Firebase tokens
    pub jwks_url: String,
}

/// Xero OAuth application settings
#[derive(Debug, Clone)]
pub struct XeroConfig {
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Registered redirect URI
    pub redirect_uri: Option<String>,
    /// Authorize endpoint
    pub authorize_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Tenant listing endpoint
    pub connections_url: String,
}

impl Default for XeroConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            authorize_url: constants::xero::AUTHORIZE_URL.to_owned(),
            token_url: constants::xero::TOKEN_URL.to_owned(),
            connections_url: constants::xero::CONNECTIONS_URL.to_owned(),
        }
    }
}

/// Shopify OAuth application settings
#[derive(Debug, Clone, Default)]
pub struct ShopifyConfig {
    /// App client id
    pub client_id: Option<String>,
    /// App client secret (also the HMAC key)
    pub client_secret: Option<String>,
    /// Registered redirect URI
    pub redirect_uri: Option<String>,
    /// Reject callbacks whose `hmac` does not verify
    pub verify_hmac: bool,
    /// Replaces `https://{shop}` for token and shop calls (local test servers)
    pub api_base_override: Option<String>,
}

/// Provisioning webhook settings
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Webhook location
    pub url: String,
    /// Per-attempt timeout for Xero
    pub xero_timeout: Duration,
    /// Per-attempt timeout for Shopify
    pub shopify_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
}

impl ProvisioningConfig {
    /// Longest a trigger can take: every attempt hitting the slower timeout
    /// plus the delays between attempts
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let per_attempt = self.xero_timeout.max(self.shopify_timeout);
        per_attempt
            .saturating_mul(self.max_retries.saturating_add(1))
            .saturating_add(self.retry_delay.saturating_mul(self.max_retries))
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            url: constants::provisioning::DEFAULT_URL.to_owned(),
            xero_timeout: Duration::from_secs(constants::provisioning::XERO_TIMEOUT_SECS),
            shopify_timeout: Duration::from_secs(constants::provisioning::SHOPIFY_TIMEOUT_SECS),
            max_retries: constants::provisioning::MAX_RETRIES,
            retry_delay: Duration::from_millis(constants::provisioning::RETRY_DELAY_MS),
        }
    }
}

/// Chat backend settings
#[derive(Debug, Clone)]
pub struct ChatBackendConfig {
    /// Backend base URL (`CLOUD_RUN_API_URL`)
    pub api_url: Option<String>,
    /// Relay timeout
    pub timeout: Duration,
}

impl Default for ChatBackendConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout: Duration::from_secs(constants::chat::BACKEND_TIMEOUT_SECS),
        }
    }
}

/// Rate limiter settings
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// POST requests allowed per window and client
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: constants::rate_limit::MAX_REQUESTS,
            window: Duration::from_secs(constants::rate_limit::WINDOW_SECS),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port
    pub http_port: u16,
    /// Public base URL, used for redirects and the cookie `Secure` flag
    pub base_url: String,
    /// Whole-request timeout; OAuth callbacks add the provisioning budget on top
    pub request_timeout: Duration,
    /// Deployment environment
    pub environment: Environment,
    /// sqlx connection string
    pub database_url: String,
    /// Secret used to derive the credential encryption key
    pub encryption_key: String,
    /// Session verification
    pub session: SessionConfig,
    /// Xero application
    pub xero: XeroConfig,
    /// Shopify application
    pub shopify: ShopifyConfig,
    /// Provisioning webhook
    pub provisioning: ProvisioningConfig,
    /// Chat backend
    pub chat: ChatBackendConfig,
    /// Rate limiter
    pub rate_limit: RateLimitConfig,
    /// Bearer key for the internal credentials API (disabled when unset)
    pub internal_api_key: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: constants::server::DEFAULT_HTTP_PORT,
            base_url: constants::server::DEFAULT_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(constants::server::REQUEST_TIMEOUT_SECS),
            environment: Environment::default(),
            database_url: constants::server::DEFAULT_DATABASE_URL.to_owned(),
            encryption_key: String::new(),
            session: SessionConfig {
                jwks_url: constants::session::FIREBASE_JWKS_URL.to_owned(),
                ..SessionConfig::default()
            },
            xero: XeroConfig::default(),
            shopify: ShopifyConfig::default(),
            provisioning: ProvisioningConfig::default(),
            chat: ChatBackendConfig::default(),
            rate_limit: RateLimitConfig::default(),
            internal_api_key: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a config error if `ENCRYPTION_KEY` is missing, a numeric
    /// variable does not parse, or the selected session verifier lacks its
    /// secret or project id.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let encryption_key = optional_var("ENCRYPTION_KEY")
            .ok_or_else(|| AppError::config("ENCRYPTION_KEY must be set"))?;

        let session = SessionConfig {
            verifier: match optional_var("SESSION_VERIFIER").as_deref() {
                Some("shared_secret" | "hs256") => SessionVerifierKind::SharedSecret,
                _ => SessionVerifierKind::Firebase,
            },
            firebase_project_id: optional_var("FIREBASE_PROJECT_ID"),
            jwt_secret: optional_var("SESSION_JWT_SECRET"),
            jwks_url: optional_var("FIREBASE_JWKS_URL").unwrap_or(defaults.session.jwks_url),
        };

        let xero = XeroConfig {
            client_id: optional_var("XERO_CLIENT_ID"),
            client_secret: optional_var("XERO_CLIENT_SECRET"),
            redirect_uri: optional_var("XERO_REDIRECT_URI"),
            authorize_url: optional_var("XERO_AUTHORIZE_URL").unwrap_or(defaults.xero.authorize_url),
            token_url: optional_var("XERO_TOKEN_URL").unwrap_or(defaults.xero.token_url),
            connections_url: optional_var("XERO_CONNECTIONS_URL")
                .unwrap_or(defaults.xero.connections_url),
        };

        let shopify = ShopifyConfig {
            client_id: optional_var("SHOPIFY_CLIENT_ID"),
            client_secret: optional_var("SHOPIFY_CLIENT_SECRET"),
            redirect_uri: optional_var("SHOPIFY_REDIRECT_URI"),
            verify_hmac: parse_bool("SHOPIFY_VERIFY_HMAC", true)?,
            api_base_override: optional_var("SHOPIFY_API_BASE_OVERRIDE"),
        };

        let provisioning = ProvisioningConfig {
            url: optional_var("PROVISION_CONNECTOR_URL").unwrap_or(defaults.provisioning.url),
            xero_timeout: parse_secs("PROVISION_XERO_TIMEOUT_SECS", defaults.provisioning.xero_timeout)?,
            shopify_timeout: parse_secs(
                "PROVISION_SHOPIFY_TIMEOUT_SECS",
                defaults.provisioning.shopify_timeout,
            )?,
            max_retries: parse_var("PROVISION_MAX_RETRIES", defaults.provisioning.max_retries)?,
            retry_delay: Duration::from_millis(parse_var(
                "PROVISION_RETRY_DELAY_MS",
                constants::provisioning::RETRY_DELAY_MS,
            )?),
        };

        let chat = ChatBackendConfig {
            api_url: optional_var("CLOUD_RUN_API_URL"),
            timeout: parse_secs("CHAT_BACKEND_TIMEOUT_SECS", defaults.chat.timeout)?,
        };

        let rate_limit = RateLimitConfig {
            max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit.max_requests)?,
            window: parse_secs("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window)?,
        };

        let config = Self {
            http_port: parse_var("HTTP_PORT", defaults.http_port)?,
            base_url: optional_var("BASE_URL")
                .map_or(defaults.base_url, |url| url.trim_end_matches('/').to_owned()),
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            environment: optional_var("ENVIRONMENT")
                .map_or(defaults.environment, |v| Environment::from_str_or_default(&v)),
            database_url: optional_var("DATABASE_URL").unwrap_or(defaults.database_url),
            encryption_key,
            session,
            xero,
            shopify,
            provisioning,
            chat,
            rate_limit,
            internal_api_key: optional_var("INTERNAL_API_KEY"),
            log_format: optional_var("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::from_str_or_default(&v)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first missing requirement
    pub fn validate(&self) -> AppResult<()> {
        if self.encryption_key.is_empty() {
            return Err(AppError::config("ENCRYPTION_KEY must not be empty"));
        }
        match self.session.verifier {
            SessionVerifierKind::Firebase if self.session.firebase_project_id.is_none() => Err(
                AppError::config("FIREBASE_PROJECT_ID is required for Firebase session verification"),
            ),
            SessionVerifierKind::SharedSecret if self.session.jwt_secret.is_none() => Err(
                AppError::config("SESSION_JWT_SECRET is required for shared-secret sessions"),
            ),
            _ => Ok(()),
        }
    }

    /// True when cookies should carry the `Secure` flag
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {name}: {e}")))
    })
}

fn parse_secs(name: &str, default: Duration) -> AppResult<Duration> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}

fn parse_bool(name: &str, default: bool) -> AppResult<bool> {
    optional_var(name).map_or(Ok(default), |raw| match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config(format!("Invalid {name}: {other}"))),
    })
}
