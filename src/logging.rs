// ABOUTME: Tracing subscriber setup for the server binary
// ABOUTME: Chooses JSON or human readable output and honours RUST_LOG
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::environment::LogFormat;
use crate::errors::{AppError, AppResult};

/// Filter applied when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber was already installed
pub fn init_logging(format: LogFormat) -> AppResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };

    result.map_err(|e| AppError::internal(format!("Failed to initialize logging: {e}")))
}
