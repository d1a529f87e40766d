// ABOUTME: Main library entry point for the Semantc gateway
// ABOUTME: Connector OAuth, provisioning, chat relay and supporting HTTP plumbing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

#![deny(unsafe_code)]

//! # Semantc gateway
//!
//! HTTP service sitting between the Semantc web app and its backends:
//!
//! - **Connectors**: Xero and Shopify OAuth callbacks link an organization,
//!   store its tokens encrypted at rest and ask the provisioning service to
//!   build the user's data connector
//! - **Chat relay**: questions are forwarded with the full history to the
//!   analytics backend; answers are stored per conversation
//! - **Plumbing**: session verification, per-IP POST rate limiting, health
//!   and an internal credentials endpoint for backend services
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use semantc_server::config::environment::ServerConfig;
//! use semantc_server::errors::AppResult;
//! use semantc_server::resources::ServerResources;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::from_config(config).await?);
//!     semantc_server::server::serve(resources).await
//! }
//! ```

/// Session verification (Firebase or shared secret)
pub mod auth;

/// Chat relay, backend client and processing state
pub mod chat;

/// Environment configuration
pub mod config;

/// Application constants
pub mod constants;

/// Token encryption at rest
pub mod crypto;

/// `SQLite` persistence for connectors, credentials and conversations
pub mod database;

/// Unified error handling
pub mod errors;

/// Logging setup
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Provider OAuth clients and the callback flow
pub mod oauth;

/// Provisioning webhook client
pub mod provisioning;

/// Shared server resources
pub mod resources;

/// HTTP routes
pub mod routes;

/// Cookie helpers
pub mod security;

/// Router assembly and serving
pub mod server;
