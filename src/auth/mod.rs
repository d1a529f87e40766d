// ABOUTME: Request authentication for browser and backend callers
// ABOUTME: Pulls the identity token from the session cookie or bearer header and verifies it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Session verifier trait and implementations
pub mod session;

use std::sync::Arc;

use axum::http::{header, HeaderMap};

pub use session::{
    FirebaseSessionVerifier, SessionUser, SessionVerifier, SharedSecretSessionVerifier,
};

use crate::config::environment::{SessionConfig, SessionVerifierKind};
use crate::constants;
use crate::errors::{AppError, AppResult};
use crate::security::cookies::get_cookie_value;

/// Identity token from the `session` cookie, else an `Authorization: Bearer` header
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    get_cookie_value(headers, constants::cookies::SESSION)
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(headers))
}

/// Token from an `Authorization: Bearer` header
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

/// Verify the caller of a request
///
/// # Errors
///
/// `AuthRequired` when no token was presented, `AuthInvalid` when it does not verify
pub async fn authenticate(
    headers: &HeaderMap,
    verifier: &dyn SessionVerifier,
) -> AppResult<SessionUser> {
    let token = extract_session_token(headers).ok_or_else(AppError::auth_required)?;
    verifier.verify(&token).await
}

/// Build the verifier selected by configuration
///
/// # Errors
///
/// Returns a config error when the selected verifier lacks its project id or secret
pub fn build_verifier(
    config: &SessionConfig,
    http: reqwest::Client,
) -> AppResult<Arc<dyn SessionVerifier>> {
    match config.verifier {
        SessionVerifierKind::Firebase => {
            let project_id = config
                .firebase_project_id
                .clone()
                .ok_or_else(|| AppError::config("FIREBASE_PROJECT_ID is not set"))?;
            Ok(Arc::new(FirebaseSessionVerifier::new(
                project_id,
                config.jwks_url.clone(),
                http,
            )))
        }
        SessionVerifierKind::SharedSecret => {
            let secret = config
                .jwt_secret
                .as_deref()
                .ok_or_else(|| AppError::config("SESSION_JWT_SECRET is not set"))?;
            Ok(Arc::new(SharedSecretSessionVerifier::new(secret)))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc"));

        headers.remove(header::COOKIE);
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_session_token(&headers).is_none());
    }
}
