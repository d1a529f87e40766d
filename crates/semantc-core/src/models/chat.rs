// ABOUTME: Chat conversation and message DTOs for the relay and its history
// ABOUTME: Includes the per-user processing state shown while a question is in flight
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Maximum characters kept from the first message when titling a conversation
pub const MAX_TITLE_CHARS: usize = 100;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user
    User,
    /// Backend answer
    Assistant,
    /// Instructions injected by the client
    System,
}

impl MessageRole {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(AppError::invalid_input(format!("Unknown message role: {other}"))),
        }
    }
}

/// Extra data attached to an assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// SQL the backend ran to answer the question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// Backend-reported error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent waiting on the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl MessageMetadata {
    /// True when nothing worth persisting is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sql_query.is_none() && self.error.is_none() && self.processing_time_ms.is_none()
    }
}

/// One persisted chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Client-supplied or generated message id
    pub id: String,
    /// Author
    pub role: MessageRole,
    /// Rendered text
    pub content: String,
    /// Assistant metadata, if any
    #[serde(default, skip_serializing_if = "MessageMetadata::is_empty")]
    pub metadata: MessageMetadata,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A conversation with its full message history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Conversation id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Derived from the first message
    pub title: String,
    /// Client route for the conversation
    pub path: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last time a message was added
    pub updated_at: DateTime<Utc>,
    /// Messages in creation order
    pub messages: Vec<MessageRecord>,
}

impl ConversationRecord {
    /// Title for a conversation opened with `first_message`
    #[must_use]
    pub fn title_from(first_message: &str) -> String {
        first_message.chars().take(MAX_TITLE_CHARS).collect()
    }

    /// Client route for a conversation id
    #[must_use]
    pub fn path_for(id: &str) -> String {
        format!("/chat/{id}")
    }
}

/// What the relay is doing for a conversation right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Request accepted, preparing the backend call
    Understanding,
    /// Waiting on the backend
    Querying,
    /// Formatting and persisting the reply
    Answering,
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Understanding => "understanding",
            Self::Querying => "querying",
            Self::Answering => "answering",
        };
        f.write_str(label)
    }
}
