// ABOUTME: SQLite persistence for connectors, encrypted credentials and chat history
// ABOUTME: Owns the connection pool, the token cipher and embedded migrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Database
//!
//! A single `SQLite` database holds every record the gateway owns. Writes
//! that must land together (connector sub-record plus credentials, or a
//! chat exchange) run inside one sqlx transaction.

/// Conversation and message storage
pub mod chat;
/// Connector records and provider credentials
pub mod connectors;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub use chat::ChatManager;
pub use connectors::{IntegrationUpsert, ProviderTokens};

use crate::crypto::TokenCipher;
use crate::errors::{AppError, AppResult};

/// How long a pooled connection waits before giving up
const ACQUIRE_TIMEOUT_SECS: u64 = 10;
/// Pool size for file-backed databases
const MAX_CONNECTIONS: u32 = 8;

/// Database handle with encryption support
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    cipher: TokenCipher,
}

impl Database {
    /// Connect, creating the database file if needed, and run migrations
    ///
    /// In-memory databases use a single connection that is never recycled,
    /// since every new connection would otherwise see an empty database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails or a
    /// migration fails
    pub async fn new(database_url: &str, cipher: TokenCipher) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        if !in_memory {
            ensure_parent_dir(options.get_filename())?;
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool, cipher };
        db.migrate().await?;
        Ok(db)
    }

    /// Run embedded migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cipher used for credentials at rest
    #[must_use]
    pub const fn cipher(&self) -> &TokenCipher {
        &self.cipher
    }

    /// Chat history operations
    #[must_use]
    pub fn chat(&self) -> ChatManager {
        ChatManager::new(self.pool.clone())
    }

    /// Cheap liveness probe
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| {
                AppError::database(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            }),
        _ => Ok(()),
    }
}

/// Fixed-width RFC 3339 rendering used for every stored timestamp
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid stored timestamp {raw}: {e}")))
}
