// ABOUTME: HTTP client for the external analytics chat backend
// ABOUTME: Forwards conversation history with the caller's identity and a fixed timeout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use semantc_core::models::MessageRecord;

use crate::auth::SessionUser;
use crate::config::environment::ChatBackendConfig;
use crate::constants;
use crate::errors::{AppError, AppResult};

const SERVICE: &str = "chat backend";

#[derive(Debug, Serialize)]
struct BackendMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendMetadata<'a> {
    user_id: &'a str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendRequest<'a> {
    messages: Vec<BackendMessage<'a>>,
    user_id: &'a str,
    metadata: BackendMetadata<'a>,
}

/// Answer from the backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendReply {
    /// Natural-language answer
    #[serde(default)]
    pub message: Option<String>,
    /// SQL the backend ran
    #[serde(default)]
    pub sql_query: Option<String>,
    /// Backend-side error text
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendReply {
    /// True when the reply carries non-blank answer text
    #[must_use]
    pub fn has_message(&self) -> bool {
        self.message.as_deref().is_some_and(|m| !m.trim().is_empty())
    }

    /// Text shown to the user: the message, plus a fenced SQL block when present
    #[must_use]
    pub fn render(&self) -> String {
        let message = self.message.as_deref().unwrap_or_default();
        match self.sql_query.as_deref().filter(|sql| !sql.trim().is_empty()) {
            Some(sql) => format!("{message}\n\nSQL Query:\n```sql\n{sql}\n```"),
            None => message.to_owned(),
        }
    }
}

/// Chat backend client
#[derive(Clone)]
pub struct ChatBackendClient {
    config: ChatBackendConfig,
    http: reqwest::Client,
}

impl ChatBackendClient {
    /// Create a client
    #[must_use]
    pub const fn new(config: ChatBackendConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Send the full history and wait for the answer
    ///
    /// # Errors
    ///
    /// `ExternalServiceTimeout` when the backend does not answer in time,
    /// `ExternalServiceError` for any other failure, `ConfigError` when no
    /// backend URL is configured
    pub async fn send(&self, user: &SessionUser, history: &[MessageRecord]) -> AppResult<BackendReply> {
        let base = self
            .config
            .api_url
            .as_deref()
            .ok_or_else(|| AppError::config("CLOUD_RUN_API_URL is not set"))?;
        let url = format!("{}{}", base.trim_end_matches('/'), constants::chat::CHAT_PATH);

        let body = BackendRequest {
            messages: history
                .iter()
                .map(|m| BackendMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            user_id: &user.user_id,
            metadata: BackendMetadata {
                user_id: &user.user_id,
                timestamp: Utc::now().to_rfc3339(),
            },
        };

        debug!(user_id = %user.user_id, turns = history.len(), "Relaying chat history");
        let response = self
            .http
            .post(url)
            .timeout(self.config.timeout)
            .bearer_auth(&user.token)
            .header("X-User-ID", &user.user_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::external_timeout(
                        SERVICE,
                        format!("no answer after {} seconds", self.config.timeout.as_secs()),
                    )
                } else {
                    AppError::external_service(SERVICE, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Chat backend returned an error: {detail}");
            return Err(AppError::external_service(
                SERVICE,
                format!("status {}", status.as_u16()),
            ));
        }

        let reply = response
            .json::<BackendReply>()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("invalid response: {e}")))?;
        if !reply.has_message() {
            return Err(AppError::external_service(SERVICE, "response had no message"));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_appends_fenced_sql() {
        let reply = BackendReply {
            message: Some("Revenue was up 4%.".to_owned()),
            sql_query: Some("SELECT 1".to_owned()),
            error: None,
        };
        assert_eq!(
            reply.render(),
            "Revenue was up 4%.\n\nSQL Query:\n```sql\nSELECT 1\n```"
        );
    }

    #[test]
    fn render_without_sql_is_message_only() {
        let reply = BackendReply {
            message: Some("Hello".to_owned()),
            ..BackendReply::default()
        };
        assert_eq!(reply.render(), "Hello");
    }

    #[test]
    fn blank_message_is_not_an_answer() {
        let blank = BackendReply {
            message: Some("  \n".to_owned()),
            sql_query: Some("SELECT 1".to_owned()),
            error: None,
        };
        assert!(!blank.has_message());
        assert!(!BackendReply::default().has_message());
    }
}
