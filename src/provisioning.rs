// ABOUTME: Client for the out-of-band connector provisioning webhook
// ABOUTME: Retries transient failures with a fixed delay and records the outcome on the connector
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Provisioning trigger
//!
//! After a provider is linked, the webhook at `PROVISION_CONNECTOR_URL`
//! builds the downstream data pipeline for that user. The call is slow
//! (Shopify can take minutes), flaky, and never fatal to the link itself:
//! callers log failures and move on. The final outcome is written to the
//! connector sub-record as `initiated`, `failed` or `timeout`.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use semantc_core::models::{ConnectorProvider, ProvisioningStatus};

use crate::config::environment::ProvisioningConfig;
use crate::database::Database;
use crate::errors::AppError;

/// Why provisioning did not succeed
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The last attempt hit the per-provider timeout
    #[error("provisioning timed out after {attempts} attempt(s)")]
    Timeout {
        /// Attempts made
        attempts: u32,
    },
    /// Webhook answered 4xx; not retried
    #[error("provisioning rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },
    /// Retries exhausted on 5xx or transport errors
    #[error("provisioning failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure seen
        last_error: String,
    },
}

impl From<ProvisioningError> for AppError {
    fn from(error: ProvisioningError) -> Self {
        match error {
            ProvisioningError::Timeout { .. } => {
                Self::external_timeout("provisioning", error.to_string())
            }
            ProvisioningError::Rejected { .. } | ProvisioningError::Exhausted { .. } => {
                Self::provisioning(error.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionRequest<'a> {
    user_id: &'a str,
    connector_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
}

enum AttemptError {
    Timeout,
    Server { status: u16, body: String },
    Client { status: u16, body: String },
    Transport(String),
}

impl AttemptError {
    const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client { .. })
    }

    fn describe(&self) -> String {
        match self {
            Self::Timeout => "request timed out".to_owned(),
            Self::Server { status, body } | Self::Client { status, body } => {
                format!("status {status}: {body}")
            }
            Self::Transport(message) => message.clone(),
        }
    }
}

/// Provisioning webhook client
#[derive(Clone)]
pub struct ProvisioningClient {
    config: ProvisioningConfig,
    http: reqwest::Client,
    database: Database,
}

impl ProvisioningClient {
    /// Create a client that records outcomes in `database`
    #[must_use]
    pub const fn new(config: ProvisioningConfig, http: reqwest::Client, database: Database) -> Self {
        Self {
            config,
            http,
            database,
        }
    }

    const fn timeout_for(&self, provider: ConnectorProvider) -> Duration {
        match provider {
            ConnectorProvider::Xero => self.config.xero_timeout,
            ConnectorProvider::Shopify => self.config.shopify_timeout,
        }
    }

    /// Ask the webhook to provision `provider` for `user_id`
    ///
    /// Makes one attempt plus up to `max_retries` retries on 5xx, transport
    /// errors and timeouts. The outcome is recorded on the connector before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns the final failure; callers treat it as non-fatal
    pub async fn trigger(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
    ) -> Result<(), ProvisioningError> {
        let body = ProvisionRequest {
            user_id,
            connector_type: provider.as_str(),
            action: None,
        };
        let timeout = self.timeout_for(provider);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let error = match self.attempt(&body, timeout).await {
                Ok(()) => {
                    info!(user_id, %provider, attempts, "Provisioning initiated");
                    self.record(user_id, provider, ProvisioningStatus::Initiated, None)
                        .await;
                    return Ok(());
                }
                Err(error) => error,
            };

            if error.is_retryable() && attempts <= self.config.max_retries {
                warn!(
                    user_id,
                    %provider,
                    "Provisioning attempt {attempts} failed ({}), retrying",
                    error.describe()
                );
                sleep(self.config.retry_delay).await;
                continue;
            }

            let failure = match error {
                AttemptError::Timeout => ProvisioningError::Timeout { attempts },
                AttemptError::Client { status, body } => ProvisioningError::Rejected { status, body },
                other => ProvisioningError::Exhausted {
                    attempts,
                    last_error: other.describe(),
                },
            };

            let status = if matches!(failure, ProvisioningError::Timeout { .. }) {
                ProvisioningStatus::Timeout
            } else {
                ProvisioningStatus::Failed
            };
            warn!(user_id, %provider, "Provisioning gave up: {failure}");
            self.record(user_id, provider, status, Some(&failure.to_string()))
                .await;
            return Err(failure);
        }
    }

    /// Ask the webhook to tear down `provider` resources; one attempt, errors logged
    pub async fn destroy(&self, user_id: &str, provider: ConnectorProvider) {
        let body = ProvisionRequest {
            user_id,
            connector_type: provider.as_str(),
            action: Some("destroy"),
        };
        match self.attempt(&body, self.timeout_for(provider)).await {
            Ok(()) => info!(user_id, %provider, "Provisioned resources scheduled for removal"),
            Err(error) => warn!(
                user_id,
                %provider,
                "Failed to clean up provisioned resources: {}",
                error.describe()
            ),
        }
    }

    async fn attempt(
        &self,
        body: &ProvisionRequest<'_>,
        timeout: Duration,
    ) -> Result<(), AttemptError> {
        let response = self
            .http
            .post(&self.config.url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Timeout
                } else {
                    AttemptError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(AttemptError::Server {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(AttemptError::Client {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn record(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
        status: ProvisioningStatus,
        error: Option<&str>,
    ) {
        if let Err(e) = self
            .database
            .set_provisioning_status(user_id, provider, status, error)
            .await
        {
            warn!(user_id, %provider, "Failed to record provisioning status {status}: {e}");
        }
    }
}
