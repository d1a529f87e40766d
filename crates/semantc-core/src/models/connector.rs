// ABOUTME: Connector and credential DTOs for linked Xero and Shopify accounts
// ABOUTME: ConnectorProvider, ProvisioningStatus, per-provider integration and credential records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// External data source a user can link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorProvider {
    /// Xero accounting
    Xero,
    /// Shopify store
    Shopify,
}

impl ConnectorProvider {
    /// Every supported provider, in display order
    pub const ALL: [Self; 2] = [Self::Xero, Self::Shopify];

    /// Stable lowercase identifier used in storage and URLs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xero => "xero",
            Self::Shopify => "shopify",
        }
    }
}

impl fmt::Display for ConnectorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xero" => Ok(Self::Xero),
            "shopify" => Ok(Self::Shopify),
            other => Err(AppError::invalid_input(format!(
                "Unsupported connector provider: {other}"
            ))),
        }
    }
}

/// Outcome of the out-of-band provisioning call for a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStatus {
    /// Connector stored, provisioning not attempted yet
    Pending,
    /// Webhook accepted the request
    Initiated,
    /// Webhook failed after retries or rejected the request
    Failed,
    /// Webhook did not answer within the configured timeout
    Timeout,
}

impl ProvisioningStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initiated => "initiated",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "initiated" => Ok(Self::Initiated),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            other => Err(AppError::database(format!(
                "Unknown provisioning status: {other}"
            ))),
        }
    }
}

/// Per-provider sub-record of a user's connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRecord {
    /// Which provider this entry describes
    pub provider: ConnectorProvider,
    /// Whether the link is currently usable
    pub active: bool,
    /// Xero tenant id or Shopify shop domain
    pub tenant_id: String,
    /// Human readable organization or shop name
    pub tenant_name: String,
    /// Last time this entry was written
    pub updated_at: DateTime<Utc>,
    /// Last recorded provisioning outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_status: Option<ProvisioningStatus>,
    /// Failure reason when provisioning failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,
    /// When provisioning was last attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_provisioning_attempt: Option<DateTime<Utc>>,
}

/// A user's connector record across all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRecord {
    /// Owning user
    pub user_id: String,
    /// Stored aggregate flag (kept equal to `any_active()` by every write)
    pub active: bool,
    /// Last time any part of the record changed
    pub updated_at: DateTime<Utc>,
    /// Per-provider entries
    pub integrations: Vec<IntegrationRecord>,
}

impl ConnectorRecord {
    /// True if at least one provider entry is active
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.integrations.iter().any(|i| i.active)
    }

    /// Entry for a specific provider
    #[must_use]
    pub fn integration(&self, provider: ConnectorProvider) -> Option<&IntegrationRecord> {
        self.integrations.iter().find(|i| i.provider == provider)
    }
}

/// Encrypted provider tokens as stored at rest
///
/// Never serialized to browser clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    /// Owning user
    pub user_id: String,
    /// Provider the tokens belong to
    pub provider: ConnectorProvider,
    /// Sealed access token
    pub encrypted_access_token: String,
    /// Sealed refresh token (Shopify offline tokens have none)
    pub encrypted_refresh_token: Option<String>,
    /// Access token expiry as unix seconds
    pub expires_at: Option<i64>,
    /// Token type reported by the provider
    pub token_type: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Last time the tokens were written
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration(provider: ConnectorProvider, active: bool) -> IntegrationRecord {
        IntegrationRecord {
            provider,
            active,
            tenant_id: "t".to_owned(),
            tenant_name: "n".to_owned(),
            updated_at: Utc::now(),
            provisioning_status: None,
            provisioning_error: None,
            last_provisioning_attempt: None,
        }
    }

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!("Xero".parse::<ConnectorProvider>().ok(), Some(ConnectorProvider::Xero));
        assert_eq!(
            "SHOPIFY".parse::<ConnectorProvider>().ok(),
            Some(ConnectorProvider::Shopify)
        );
        assert!("quickbooks".parse::<ConnectorProvider>().is_err());
    }

    #[test]
    fn any_active_requires_an_active_entry() {
        let mut record = ConnectorRecord {
            user_id: "u".to_owned(),
            active: false,
            updated_at: Utc::now(),
            integrations: vec![integration(ConnectorProvider::Xero, false)],
        };
        assert!(!record.any_active());

        record
            .integrations
            .push(integration(ConnectorProvider::Shopify, true));
        assert!(record.any_active());
    }

    #[test]
    fn integration_serializes_camel_case() {
        let value = serde_json::to_value(integration(ConnectorProvider::Xero, true)).unwrap_or_default();
        assert!(value.get("tenantId").is_some());
        assert!(value.get("provisioningStatus").is_none());
    }
}
