// ABOUTME: Chat relay between the browser and the analytics backend
// ABOUTME: Backend client, processing state tracking and the relay itself
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// HTTP client for the chat backend
pub mod backend;
/// Relay orchestration
pub mod relay;
/// Per-conversation processing state
pub mod state;

pub use backend::{BackendReply, ChatBackendClient};
pub use relay::{ChatExchange, ChatRelay, SubmitMessage};
pub use state::{ProcessingGuard, ProcessingTracker};
