// ABOUTME: Chat relay that turns a user question into a persisted question/answer exchange
// ABOUTME: Drives the processing state and only persists when the backend answered
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use semantc_core::models::{MessageMetadata, MessageRecord, MessageRole, ProcessingState};

use super::backend::ChatBackendClient;
use super::state::ProcessingTracker;
use crate::auth::SessionUser;
use crate::database::Database;
use crate::errors::{AppError, AppResult};

/// Longest accepted conversation id
const MAX_CONVERSATION_ID_LEN: usize = 128;

/// A new user turn
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessage {
    /// Client-generated message id; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Question text
    pub content: String,
}

/// Both turns of a completed exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    /// Conversation the turns belong to
    pub conversation_id: String,
    /// The question as stored
    pub user_message: MessageRecord,
    /// The rendered answer as stored
    pub assistant_message: MessageRecord,
}

/// Relays questions to the chat backend and records the answers
pub struct ChatRelay {
    database: Database,
    backend: ChatBackendClient,
    tracker: ProcessingTracker,
}

impl ChatRelay {
    /// Create a relay
    #[must_use]
    pub fn new(database: Database, backend: ChatBackendClient) -> Self {
        Self {
            database,
            backend,
            tracker: ProcessingTracker::new(),
        }
    }

    /// Processing state tracker
    #[must_use]
    pub const fn tracker(&self) -> &ProcessingTracker {
        &self.tracker
    }

    /// Append a user turn, ask the backend and persist both turns
    ///
    /// The state moves `understanding -> querying -> answering` and is back
    /// to `idle` when this returns, whatever the outcome. On failure nothing
    /// from the exchange is persisted.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty question or malformed id, `ResourceNotFound`
    /// when another user owns the conversation, backend errors as returned by
    /// [`ChatBackendClient::send`], or a database error
    pub async fn submit_message(
        &self,
        user: &SessionUser,
        conversation_id: &str,
        request: SubmitMessage,
    ) -> AppResult<ChatExchange> {
        validate_conversation_id(conversation_id)?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::invalid_input("Message content must not be empty"));
        }

        let guard = self.tracker.begin(&user.user_id, conversation_id);
        let chat = self.database.chat();

        if chat.is_owned_by_other(conversation_id, &user.user_id).await? {
            return Err(AppError::not_found("Conversation not found"));
        }

        let mut history = chat
            .get_conversation(conversation_id, &user.user_id)
            .await?
            .map(|conversation| conversation.messages)
            .unwrap_or_default();

        let user_message = MessageRecord {
            id: request
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: MessageRole::User,
            content: content.to_owned(),
            metadata: MessageMetadata::default(),
            created_at: Utc::now(),
        };
        history.push(user_message.clone());

        guard.advance(ProcessingState::Querying);
        let started = Instant::now();
        let reply = match self.backend.send(user, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id = %user.user_id, conversation_id, "Chat relay failed: {e}");
                return Err(e);
            }
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        guard.advance(ProcessingState::Answering);
        let assistant_message = MessageRecord {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: reply.render(),
            metadata: MessageMetadata {
                sql_query: reply.sql_query.clone(),
                error: reply.error.clone(),
                processing_time_ms: Some(elapsed_ms),
            },
            created_at: Utc::now(),
        };

        chat.save_exchange(
            conversation_id,
            &user.user_id,
            &user_message,
            &assistant_message,
        )
        .await?;

        info!(
            user_id = %user.user_id,
            conversation_id,
            elapsed_ms,
            "Chat exchange completed"
        );
        drop(guard);

        Ok(ChatExchange {
            conversation_id: conversation_id.to_owned(),
            user_message,
            assistant_message,
        })
    }
}

/// Conversation ids are client-generated; keep them to a safe alphabet
///
/// # Errors
///
/// Returns `InvalidInput` for empty, overlong or non `[A-Za-z0-9_-]` ids
pub fn validate_conversation_id(id: &str) -> AppResult<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_CONVERSATION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::invalid_input("Invalid conversation id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_alphabet() {
        assert!(validate_conversation_id("V1StGXR8_Z5jdHi6B-myT").is_ok());
        assert!(validate_conversation_id("").is_err());
        assert!(validate_conversation_id("../etc").is_err());
        assert!(validate_conversation_id(&"a".repeat(129)).is_err());
    }
}
