// ABOUTME: Unified error taxonomy shared by every Semantc component
// ABOUTME: Maps error codes to HTTP status codes and JSON error bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Error handling
//!
//! Every fallible operation at the HTTP seam returns [`AppResult`]. Lower
//! layers keep their own `thiserror` enums and convert into [`AppError`] with
//! `From` impls so handlers can use `?` throughout.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No session was presented
    AuthRequired,
    /// A session was presented but did not verify
    AuthInvalid,
    /// Request parameters are missing or malformed
    InvalidInput,
    /// Requested resource does not exist (or belongs to someone else)
    ResourceNotFound,
    /// Caller exceeded the request budget for the current window
    RateLimitExceeded,
    /// An upstream HTTP service answered with an error
    ExternalServiceError,
    /// An upstream HTTP service did not answer in time
    ExternalServiceTimeout,
    /// The provisioning webhook failed after all retries
    ProvisioningFailed,
    /// Datastore read or write failed
    DatabaseError,
    /// Encrypted data failed authentication or was malformed
    IntegrityError,
    /// Server configuration is missing or invalid
    ConfigError,
    /// Anything else
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::AuthRequired | Self::AuthInvalid => 401,
            Self::InvalidInput => 400,
            Self::ResourceNotFound => 404,
            Self::RateLimitExceeded => 429,
            Self::ExternalServiceError | Self::ProvisioningFailed => 502,
            Self::ExternalServiceTimeout => 504,
            Self::DatabaseError
            | Self::IntegrityError
            | Self::ConfigError
            | Self::InternalError => 500,
        }
    }

    /// Short description used when no message is supplied
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication required",
            Self::AuthInvalid => "Invalid session",
            Self::InvalidInput => "Invalid input",
            Self::ResourceNotFound => "Resource not found",
            Self::RateLimitExceeded => "Too many requests",
            Self::ExternalServiceError => "Upstream service error",
            Self::ExternalServiceTimeout => "Upstream service timed out",
            Self::ProvisioningFailed => "Provisioning failed",
            Self::DatabaseError => "Storage error",
            Self::IntegrityError => "Stored data failed integrity check",
            Self::ConfigError => "Configuration error",
            Self::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Application error carrying a code and a human readable message
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Error classification
    pub code: ErrorCode,
    /// Detail message; clients only see it for client-side codes
    /// (see [`AppError::public_message`])
    pub message: String,
}

/// Result alias used across the gateway
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Missing session
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, ErrorCode::AuthRequired.description())
    }

    /// Session failed verification
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Bad request input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    /// Rate limit exceeded
    pub fn rate_limited() -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            ErrorCode::RateLimitExceeded.description(),
        )
    }

    /// Upstream service failure
    pub fn external_service(service: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{service}: {}", message.into()),
        )
    }

    /// Upstream service timeout
    pub fn external_timeout(service: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceTimeout,
            format!("{service}: {}", message.into()),
        )
    }

    /// Provisioning webhook failure
    pub fn provisioning(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProvisioningFailed, message)
    }

    /// Datastore failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Encrypted data failed to authenticate
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IntegrityError, message)
    }

    /// Configuration problem
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// True when the detail message must stay server-side
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::DatabaseError
                | ErrorCode::IntegrityError
                | ErrorCode::ConfigError
                | ErrorCode::InternalError
        )
    }

    /// Message suitable for a client-facing JSON body
    ///
    /// Server-side failures are collapsed to their code description so
    /// datastore and crypto details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> &str {
        if self.is_internal() {
            self.code.description()
        } else {
            &self.message
        }
    }
}

/// JSON body returned for failed requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable message
    pub error: String,
    /// Machine readable code
    pub code: ErrorCode,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: error.public_message().to_owned(),
            code: error.code,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {error}"))
    }
}

#[cfg(feature = "http-response")]
mod http_response {
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;

    use super::{AppError, ErrorResponse};

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if self.is_internal() {
                tracing::error!(code = ?self.code, "Request failed: {}", self.message);
            }
            (status, Json(ErrorResponse::from(&self))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::auth_required().http_status(), 401);
        assert_eq!(AppError::rate_limited().http_status(), 429);
        assert_eq!(AppError::external_timeout("chat", "60s").http_status(), 504);
        assert_eq!(AppError::integrity("tag").http_status(), 500);
    }

    #[test]
    fn server_side_details_are_not_exposed() {
        let err = AppError::database("UNIQUE constraint failed: provider_credentials.user_id");
        assert_eq!(err.public_message(), "Storage error");

        let err = AppError::not_found("Conversation not found");
        assert_eq!(err.public_message(), "Conversation not found");
    }
}
