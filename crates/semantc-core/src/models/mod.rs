// ABOUTME: Canonical DTO definitions shared across the gateway
// ABOUTME: Re-exports connector, credential and chat models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Chat conversations, messages and relay processing states
pub mod chat;
/// Connector status and stored provider credentials
pub mod connector;

pub use chat::{
    ConversationRecord, MessageMetadata, MessageRecord, MessageRole, ProcessingState,
};
pub use connector::{
    ConnectorProvider, ConnectorRecord, IntegrationRecord, ProvisioningStatus, StoredCredentials,
};
