// ABOUTME: Semantc gateway server binary
// ABOUTME: Loads configuration from the environment, applies CLI overrides and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Semantc gateway
//!
//! ```bash
//! ENCRYPTION_KEY=... FIREBASE_PROJECT_ID=... semantc-server --port 3000
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use semantc_server::config::environment::ServerConfig;
use semantc_server::logging::init_logging;
use semantc_server::resources::ServerResources;
use semantc_server::server;

#[derive(Parser)]
#[command(
    name = "semantc-server",
    about = "Semantc gateway",
    long_about = "Connector OAuth callbacks, provisioning and the chat relay for the Semantc web app"
)]
struct Args {
    /// HTTP port override
    #[arg(long)]
    port: Option<u16>,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }
    config.validate().context("Invalid configuration")?;

    init_logging(config.log_format).context("Failed to initialize logging")?;
    info!(
        port = config.http_port,
        environment = config.environment.as_str(),
        "Starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let resources = ServerResources::from_config(config)
        .await
        .context("Failed to initialize server resources")?;
    server::serve(Arc::new(resources))
        .await
        .context("Server terminated with an error")?;
    Ok(())
}
