// ABOUTME: Chat route handlers for the analytics assistant
// ABOUTME: Message relay, conversation history and processing state (polling and SSE)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! Chat routes
//!
//! All handlers require a verified session. Conversations belonging to other
//! users are reported as missing. Processing state is tracked per
//! conversation of the calling user.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};

use semantc_core::models::{ConversationRecord, ProcessingState};

use crate::auth::{self, SessionUser};
use crate::chat::relay::validate_conversation_id;
use crate::chat::SubmitMessage;
use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;

// ============================================================================
// Response Types
// ============================================================================

/// Conversation listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    /// Newest first
    pub conversations: Vec<ConversationRecord>,
    /// Number of conversations returned
    pub total: usize,
}

/// Current processing state
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStateResponse {
    /// Conversation the caller asked about
    pub conversation_id: String,
    /// Relay state of the conversation
    pub state: ProcessingState,
}

// ============================================================================
// Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat/conversations", get(Self::list_conversations))
            .route(
                "/api/chat/conversations/:conversation_id",
                get(Self::get_conversation).delete(Self::delete_conversation),
            )
            .route(
                "/api/chat/conversations/:conversation_id/messages",
                post(Self::send_message),
            )
            .route(
                "/api/chat/conversations/:conversation_id/state",
                get(Self::get_state),
            )
            .route(
                "/api/chat/conversations/:conversation_id/events",
                get(Self::stream_state),
            )
            .with_state(resources)
    }

    async fn authenticate(
        headers: &HeaderMap,
        resources: &ServerResources,
    ) -> AppResult<SessionUser> {
        auth::authenticate(headers, resources.verifier.as_ref()).await
    }

    // ========================================================================
    // Conversation Handlers
    // ========================================================================

    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        let conversations = resources
            .database
            .chat()
            .list_conversations(&user.user_id)
            .await?;

        Ok(Json(ConversationListResponse {
            total: conversations.len(),
            conversations,
        })
        .into_response())
    }

    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        validate_conversation_id(&conversation_id)?;

        let conversation = resources
            .database
            .chat()
            .get_conversation(&conversation_id, &user.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;

        Ok(Json(conversation).into_response())
    }

    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        validate_conversation_id(&conversation_id)?;

        let deleted = resources
            .database
            .chat()
            .delete_conversation(&conversation_id, &user.user_id)
            .await?;

        if !deleted {
            return Err(AppError::not_found("Conversation not found"));
        }

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    // ========================================================================
    // Message Handlers
    // ========================================================================

    /// Relay a question and return both stored turns
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        Json(request): Json<SubmitMessage>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        let exchange = resources
            .chat
            .submit_message(&user, &conversation_id, request)
            .await?;

        Ok(Json(exchange).into_response())
    }

    // ========================================================================
    // Processing State
    // ========================================================================

    async fn get_state(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        validate_conversation_id(&conversation_id)?;

        let state = resources
            .chat
            .tracker()
            .current(&user.user_id, &conversation_id);
        Ok(Json(ProcessingStateResponse {
            conversation_id,
            state,
        })
        .into_response())
    }

    /// `state` events carrying the current value, then every change
    async fn stream_state(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        validate_conversation_id(&conversation_id)?;

        let receiver = resources
            .chat
            .tracker()
            .subscribe(&user.user_id, &conversation_id);
        let stream = WatchStream::new(receiver)
            .map(|state| Ok(Event::default().event("state").data(state.to_string())));

        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }
}
