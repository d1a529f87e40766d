// ABOUTME: Identity token verification behind a pluggable trait
// ABOUTME: Firebase ID tokens via Google's JWKS, or HS256 shared-secret tokens for development
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::constants;
use crate::errors::{AppError, AppResult};

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Stable user id (`sub` claim)
    pub user_id: String,
    /// Email claim when present
    pub email: Option<String>,
    /// The raw identity token, forwarded to the chat backend
    pub token: String,
}

/// Turns a presented token into a user id
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Verify `token` and return the caller
    ///
    /// # Errors
    ///
    /// Returns an `AuthInvalid` error when the token does not verify
    async fn verify(&self, token: &str) -> AppResult<SessionUser>;
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

impl IdentityClaims {
    fn into_user(self, token: &str) -> AppResult<SessionUser> {
        if self.sub.is_empty() {
            return Err(AppError::auth_invalid("Token has an empty subject"));
        }
        Ok(SessionUser {
            user_id: self.sub,
            email: self.email,
            token: token.to_owned(),
        })
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies Firebase ID tokens (RS256) against Google's published keys
pub struct FirebaseSessionVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
    cache_ttl: Duration,
}

impl FirebaseSessionVerifier {
    /// Create a verifier for `project_id`
    #[must_use]
    pub fn new(project_id: String, jwks_url: String, http: reqwest::Client) -> Self {
        Self {
            project_id,
            jwks_url,
            http,
            cache: RwLock::new(None),
            cache_ttl: Duration::from_secs(constants::session::JWKS_CACHE_TTL_SECS),
        }
    }

    async fn fetch_keys(&self) -> AppResult<JwkSet> {
        debug!("Fetching identity token signing keys");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::external_service("jwks", e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::external_service(
                "jwks",
                format!("status {}", response.status()),
            ));
        }
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AppError::external_service("jwks", e.to_string()))
    }

    async fn decoding_key(&self, kid: &str) -> AppResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| AppError::auth_invalid(format!("Unusable signing key: {e}")));
                    }
                }
            }
        }

        // Unknown kid or stale cache: Google rotates keys, so refetch once
        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .ok_or_else(|| AppError::auth_invalid("Token signed with an unknown key"))
            .and_then(|jwk| {
                DecodingKey::from_jwk(jwk)
                    .map_err(|e| AppError::auth_invalid(format!("Unusable signing key: {e}")))
            });

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key
    }
}

#[async_trait]
impl SessionVerifier for FirebaseSessionVerifier {
    async fn verify(&self, token: &str) -> AppResult<SessionUser> {
        let header = decode_header(token)
            .map_err(|e| AppError::auth_invalid(format!("Malformed token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(AppError::auth_invalid("Unexpected token algorithm"));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::auth_invalid("Token has no key id"))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!(
            "{}{}",
            constants::session::FIREBASE_ISSUER_PREFIX,
            self.project_id
        )]);

        let data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
            warn!("Identity token rejected: {e}");
            AppError::auth_invalid("Invalid session token")
        })?;
        data.claims.into_user(token)
    }
}

/// Verifies HS256 tokens signed with a shared secret
pub struct SharedSecretSessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SharedSecretSessionVerifier {
    /// Create a verifier for `secret`
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionVerifier for SharedSecretSessionVerifier {
    async fn verify(&self, token: &str) -> AppResult<SessionUser> {
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map_err(|e| AppError::auth_invalid(format!("Invalid session token: {e}")))?;
        data.claims.into_user(token)
    }
}
