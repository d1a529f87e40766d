// ABOUTME: Database operations for chat conversations and their messages
// ABOUTME: Completed exchanges are written atomically and scoped to the owning user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use semantc_core::models::{ConversationRecord, MessageMetadata, MessageRecord};

use super::{format_timestamp, parse_timestamp};
use crate::constants;
use crate::errors::{AppError, AppResult};

/// Chat database operations manager
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load a conversation with its messages, only if `user_id` owns it
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, path, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        match row {
            Some(row) => {
                let messages = self.get_messages(conversation_id).await?;
                Ok(Some(row_to_conversation(&row, messages)?))
            }
            None => Ok(None),
        }
    }

    /// True if the id is taken by a conversation that `user_id` does not own
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn is_owned_by_other(&self, conversation_id: &str, user_id: &str) -> AppResult<bool> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to check ownership: {e}")))?;
        Ok(owner.is_some_and(|owner| owner != user_id))
    }

    /// All of a user's conversations with messages, most recently active first
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<ConversationRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, path, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC, id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let messages = self.get_messages(&id).await?;
            conversations.push(row_to_conversation(row, messages)?);
        }
        Ok(conversations)
    }

    /// Messages of a conversation in timestamp order, ties by insertion
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is invalid
    pub async fn get_messages(&self, conversation_id: &str) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, role, content, metadata, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, seq ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    /// Persist a completed exchange in one transaction
    ///
    /// Creates the conversation on first use, titling it from `user_message`
    /// (or the earliest stored message when the conversation already exists)
    /// and appends both turns. Re-sent message ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if another user owns `conversation_id`, or
    /// a database error if any statement fails
    pub async fn save_exchange(
        &self,
        conversation_id: &str,
        user_id: &str,
        user_message: &MessageRecord,
        assistant_message: &MessageRecord,
    ) -> AppResult<()> {
        let now = format_timestamp(Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to check ownership: {e}")))?;

        match owner {
            Some(owner) if owner != user_id => {
                return Err(AppError::not_found("Conversation not found"));
            }
            Some(_) => {
                sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2")
                    .bind(&now)
                    .bind(conversation_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::database(format!("Failed to touch conversation: {e}"))
                    })?;
            }
            None => {
                let title = if user_message.content.trim().is_empty() {
                    constants::chat::DEFAULT_TITLE.to_owned()
                } else {
                    ConversationRecord::title_from(&user_message.content)
                };
                sqlx::query(
                    r"
                    INSERT INTO conversations (id, user_id, title, path, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    ",
                )
                .bind(conversation_id)
                .bind(user_id)
                .bind(&title)
                .bind(ConversationRecord::path_for(conversation_id))
                .bind(format_timestamp(user_message.created_at))
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;
            }
        }

        for message in [user_message, assistant_message] {
            let metadata = if message.metadata.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&message.metadata)?)
            };
            sqlx::query(
                r"
                INSERT OR IGNORE INTO messages (id, conversation_id, role, content, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(&message.id)
            .bind(conversation_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(metadata)
            .bind(format_timestamp(message.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to save message: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit exchange: {e}")))
    }

    /// Delete a conversation and its messages
    ///
    /// Returns whether the user owned such a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let deleted = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?
            .rows_affected();

        if deleted > 0 {
            sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to delete messages: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit delete: {e}")))?;
        Ok(deleted > 0)
    }
}

fn row_to_conversation(row: &SqliteRow, messages: Vec<MessageRecord>) -> AppResult<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        path: row.get("path"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
        messages,
    })
}

fn row_to_message(row: &SqliteRow) -> AppResult<MessageRecord> {
    let role: String = row.get("role");
    let metadata: Option<String> = row.get("metadata");
    let metadata = match metadata {
        Some(raw) => serde_json::from_str::<MessageMetadata>(&raw)?,
        None => MessageMetadata::default(),
    };

    Ok(MessageRecord {
        id: row.get("id"),
        role: role.parse()?,
        content: row.get("content"),
        metadata,
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}
