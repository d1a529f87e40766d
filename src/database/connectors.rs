// ABOUTME: Connector record and provider credential storage
// ABOUTME: Links, provisioning status updates and disconnects run as single transactions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use semantc_core::models::{
    ConnectorProvider, ConnectorRecord, IntegrationRecord, ProvisioningStatus, StoredCredentials,
};

use super::{format_timestamp, parse_timestamp, Database};
use crate::errors::{AppError, AppResult};

/// Organization or shop being linked
pub struct IntegrationUpsert<'a> {
    /// Provider being linked
    pub provider: ConnectorProvider,
    /// Xero tenant id or Shopify shop domain
    pub tenant_id: &'a str,
    /// Display name
    pub tenant_name: &'a str,
}

/// Decrypted provider tokens
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTokens {
    /// Access token
    pub access_token: String,
    /// Refresh token, if the provider issued one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Token type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl std::fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ProviderTokens {
    /// True when the access token expires within `leeway_secs`
    #[must_use]
    pub fn expires_within(&self, leeway_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now().timestamp() + leeway_secs)
    }
}

impl Database {
    /// Link a provider: upsert its sub-record, the overall flag and the
    /// encrypted credentials in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or any statement fails; nothing is
    /// written in that case
    pub async fn save_connection(
        &self,
        user_id: &str,
        integration: &IntegrationUpsert<'_>,
        tokens: &ProviderTokens,
    ) -> AppResult<()> {
        let access_token = self.cipher().encrypt(&tokens.access_token)?;
        let refresh_token = self
            .cipher()
            .encrypt_optional(tokens.refresh_token.as_deref())?;
        let now = format_timestamp(Utc::now());
        let provider = integration.provider.as_str();

        let mut tx = self.begin().await?;

        sqlx::query(
            r"
            INSERT INTO connectors (user_id, active, updated_at) VALUES ($1, 1, $2)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(user_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert connector: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO connector_integrations (
                user_id, provider, active, tenant_id, tenant_name,
                provisioning_status, provisioning_error, last_provisioning_attempt, updated_at
            ) VALUES ($1, $2, 1, $3, $4, $5, NULL, NULL, $6)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                active = 1,
                tenant_id = EXCLUDED.tenant_id,
                tenant_name = EXCLUDED.tenant_name,
                provisioning_status = EXCLUDED.provisioning_status,
                provisioning_error = NULL,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(user_id)
        .bind(provider)
        .bind(integration.tenant_id)
        .bind(integration.tenant_name)
        .bind(ProvisioningStatus::Pending.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert integration: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO provider_credentials (
                user_id, provider, access_token, refresh_token, expires_at, token_type, scope, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                token_type = EXCLUDED.token_type,
                scope = EXCLUDED.scope,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(user_id)
        .bind(provider)
        .bind(&access_token)
        .bind(refresh_token.as_deref())
        .bind(tokens.expires_at)
        .bind(tokens.token_type.as_deref())
        .bind(tokens.scope.as_deref())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert credentials: {e}")))?;

        refresh_active_flag(&mut tx, user_id, &now).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit connection: {e}")))?;

        debug!(user_id, provider, "Stored connector and credentials");
        Ok(())
    }

    /// A user's connector record, if one exists
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored value is invalid
    pub async fn get_connector(&self, user_id: &str) -> AppResult<Option<ConnectorRecord>> {
        let Some(row) = sqlx::query("SELECT active, updated_at FROM connectors WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to load connector: {e}")))?
        else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r"
            SELECT provider, active, tenant_id, tenant_name, provisioning_status,
                   provisioning_error, last_provisioning_attempt, updated_at
            FROM connector_integrations
            WHERE user_id = $1
            ORDER BY provider
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to load integrations: {e}")))?;

        let integrations = rows
            .iter()
            .map(row_to_integration)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Some(ConnectorRecord {
            user_id: user_id.to_owned(),
            active: row.get("active"),
            updated_at: parse_timestamp(row.get("updated_at"))?,
            integrations,
        }))
    }

    /// Record the outcome of a provisioning attempt
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_provisioning_status(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
        status: ProvisioningStatus,
        error: Option<&str>,
    ) -> AppResult<()> {
        let now = format_timestamp(Utc::now());
        sqlx::query(
            r"
            UPDATE connector_integrations
            SET provisioning_status = $1,
                provisioning_error = $2,
                last_provisioning_attempt = $3,
                updated_at = $3
            WHERE user_id = $4 AND provider = $5
            ",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(&now)
        .bind(user_id)
        .bind(provider.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to record provisioning status: {e}")))?;
        Ok(())
    }

    /// Remove a provider's sub-record and credentials together
    ///
    /// Returns whether anything was linked.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is removed in that case
    pub async fn disconnect_provider(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
    ) -> AppResult<bool> {
        let now = format_timestamp(Utc::now());
        let mut tx = self.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM connector_integrations WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to remove integration: {e}")))?
        .rows_affected();

        sqlx::query("DELETE FROM provider_credentials WHERE user_id = $1 AND provider = $2")
            .bind(user_id)
            .bind(provider.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to remove credentials: {e}")))?;

        refresh_active_flag(&mut tx, user_id, &now).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit disconnect: {e}")))?;
        Ok(removed > 0)
    }

    /// Encrypted credentials as stored
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_stored_credentials(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
    ) -> AppResult<Option<StoredCredentials>> {
        let row = sqlx::query(
            r"
            SELECT access_token, refresh_token, expires_at, token_type, scope, updated_at
            FROM provider_credentials
            WHERE user_id = $1 AND provider = $2
            ",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to load credentials: {e}")))?;

        row.map(|r| {
            Ok(StoredCredentials {
                user_id: user_id.to_owned(),
                provider,
                encrypted_access_token: r.get("access_token"),
                encrypted_refresh_token: r.get("refresh_token"),
                expires_at: r.get("expires_at"),
                token_type: r.get("token_type"),
                scope: r.get("scope"),
                updated_at: parse_timestamp(r.get("updated_at"))?,
            })
        })
        .transpose()
    }

    /// Decrypted credentials for a provider
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a stored token fails to decrypt
    pub async fn get_provider_tokens(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
    ) -> AppResult<Option<ProviderTokens>> {
        let Some(stored) = self.get_stored_credentials(user_id, provider).await? else {
            return Ok(None);
        };

        let refresh_token = stored
            .encrypted_refresh_token
            .as_deref()
            .map(|blob| self.cipher().decrypt(blob))
            .transpose()?;

        Ok(Some(ProviderTokens {
            access_token: self.cipher().decrypt(&stored.encrypted_access_token)?,
            refresh_token,
            expires_at: stored.expires_at,
            token_type: stored.token_type,
            scope: stored.scope,
        }))
    }

    /// Replace the tokens of an existing link after a refresh
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the provider is not linked
    pub async fn update_provider_tokens(
        &self,
        user_id: &str,
        provider: ConnectorProvider,
        tokens: &ProviderTokens,
    ) -> AppResult<()> {
        let access_token = self.cipher().encrypt(&tokens.access_token)?;
        let refresh_token = self
            .cipher()
            .encrypt_optional(tokens.refresh_token.as_deref())?;

        let updated = sqlx::query(
            r"
            UPDATE provider_credentials
            SET access_token = $1, refresh_token = $2, expires_at = $3,
                token_type = $4, scope = $5, updated_at = $6
            WHERE user_id = $7 AND provider = $8
            ",
        )
        .bind(&access_token)
        .bind(refresh_token.as_deref())
        .bind(tokens.expires_at)
        .bind(tokens.token_type.as_deref())
        .bind(tokens.scope.as_deref())
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .bind(provider.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update credentials: {e}")))?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::not_found(format!("{provider} is not connected")));
        }
        Ok(())
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))
    }
}

/// Keep `connectors.active` equal to "any sub-record active"
async fn refresh_active_flag(
    tx: &mut Transaction<'static, Sqlite>,
    user_id: &str,
    now: &str,
) -> AppResult<()> {
    sqlx::query(
        r"
        UPDATE connectors
        SET active = EXISTS (
                SELECT 1 FROM connector_integrations WHERE user_id = $1 AND active = 1
            ),
            updated_at = $2
        WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::database(format!("Failed to refresh connector flag: {e}")))?;
    Ok(())
}

fn row_to_integration(row: &SqliteRow) -> AppResult<IntegrationRecord> {
    let provider: String = row.get("provider");
    let status: Option<String> = row.get("provisioning_status");
    let last_attempt: Option<String> = row.get("last_provisioning_attempt");

    Ok(IntegrationRecord {
        provider: provider
            .parse()
            .map_err(|_| AppError::database(format!("Unknown stored provider: {provider}")))?,
        active: row.get("active"),
        tenant_id: row.get("tenant_id"),
        tenant_name: row.get("tenant_name"),
        updated_at: parse_timestamp(row.get("updated_at"))?,
        provisioning_status: status.as_deref().map(str::parse).transpose()?,
        provisioning_error: row.get("provisioning_error"),
        last_provisioning_attempt: last_attempt.as_deref().map(parse_timestamp).transpose()?,
    })
}
