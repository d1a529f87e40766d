// ABOUTME: Unit tests for the chat database module
// ABOUTME: Exchange persistence, message ordering, titles and per-user isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

// Test files: allow missing_docs (rustc lint) and unwrap (valid in tests)
#![allow(missing_docs, clippy::unwrap_used)]

mod common;

use chrono::{Duration, Utc};
use semantc_core::errors::ErrorCode;
use semantc_core::models::{MessageMetadata, MessageRecord, MessageRole};

use common::create_test_database;

fn message(id: &str, role: MessageRole, content: &str, offset_ms: i64) -> MessageRecord {
    MessageRecord {
        id: id.to_owned(),
        role,
        content: content.to_owned(),
        metadata: MessageMetadata::default(),
        created_at: Utc::now() + Duration::milliseconds(offset_ms),
    }
}

#[tokio::test]
async fn test_first_exchange_creates_conversation() {
    let db = create_test_database().await;
    let chat = db.chat();

    let mut answer = message("m2", MessageRole::Assistant, "Revenue was $10k", 1);
    answer.metadata.sql_query = Some("SELECT 1".to_owned());
    answer.metadata.processing_time_ms = Some(42);

    chat.save_exchange(
        "conv-1",
        "user-1",
        &message("m1", MessageRole::User, "What was revenue?", 0),
        &answer,
    )
    .await
    .unwrap();

    let conversation = chat.get_conversation("conv-1", "user-1").await.unwrap().unwrap();
    assert_eq!(conversation.user_id, "user-1");
    assert_eq!(conversation.title, "What was revenue?");
    assert_eq!(conversation.path, "/chat/conv-1");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[1].metadata.sql_query.as_deref(), Some("SELECT 1"));
    assert_eq!(conversation.messages[1].metadata.processing_time_ms, Some(42));
    assert!(conversation.messages[0].metadata.is_empty());
}

#[tokio::test]
async fn test_title_is_truncated_and_kept() {
    let db = create_test_database().await;
    let chat = db.chat();
    let long = "é".repeat(250);

    chat.save_exchange(
        "conv-t",
        "user-1",
        &message("a1", MessageRole::User, &long, 0),
        &message("a2", MessageRole::Assistant, "ok", 1),
    )
    .await
    .unwrap();
    chat.save_exchange(
        "conv-t",
        "user-1",
        &message("a3", MessageRole::User, "A different question", 2),
        &message("a4", MessageRole::Assistant, "ok", 3),
    )
    .await
    .unwrap();

    let conversation = chat.get_conversation("conv-t", "user-1").await.unwrap().unwrap();
    assert_eq!(conversation.title, "é".repeat(100));
    assert_eq!(conversation.messages.len(), 4);
}

#[tokio::test]
async fn test_messages_are_ordered_by_timestamp() {
    let db = create_test_database().await;
    let chat = db.chat();

    chat.save_exchange(
        "conv-o",
        "user-1",
        &message("late-q", MessageRole::User, "second", 100),
        &message("late-a", MessageRole::Assistant, "second answer", 101),
    )
    .await
    .unwrap();
    chat.save_exchange(
        "conv-o",
        "user-1",
        &message("early-q", MessageRole::User, "first", 0),
        &message("early-a", MessageRole::Assistant, "first answer", 1),
    )
    .await
    .unwrap();

    let ids: Vec<String> = chat
        .get_messages("conv-o")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, ["early-q", "early-a", "late-q", "late-a"]);
}

#[tokio::test]
async fn test_resent_message_ids_are_ignored() {
    let db = create_test_database().await;
    let chat = db.chat();
    let question = message("dup-q", MessageRole::User, "Hello", 0);

    chat.save_exchange("conv-d", "user-1", &question, &message("r1", MessageRole::Assistant, "Hi", 1))
        .await
        .unwrap();
    chat.save_exchange("conv-d", "user-1", &question, &message("r2", MessageRole::Assistant, "Hi again", 2))
        .await
        .unwrap();

    let messages = chat.get_messages("conv-d").await.unwrap();
    assert_eq!(messages.len(), 3);
}

#[tokio::test]
async fn test_conversations_are_scoped_to_owner() {
    let db = create_test_database().await;
    let chat = db.chat();

    chat.save_exchange(
        "conv-owned",
        "owner",
        &message("o1", MessageRole::User, "Mine", 0),
        &message("o2", MessageRole::Assistant, "Yes", 1),
    )
    .await
    .unwrap();

    assert!(chat.get_conversation("conv-owned", "intruder").await.unwrap().is_none());
    assert!(chat.list_conversations("intruder").await.unwrap().is_empty());
    assert!(chat.is_owned_by_other("conv-owned", "intruder").await.unwrap());
    assert!(!chat.is_owned_by_other("conv-owned", "owner").await.unwrap());
    assert!(!chat.is_owned_by_other("conv-new", "intruder").await.unwrap());

    let error = chat
        .save_exchange(
            "conv-owned",
            "intruder",
            &message("i1", MessageRole::User, "Hijack", 2),
            &message("i2", MessageRole::Assistant, "No", 3),
        )
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
    assert_eq!(chat.get_messages("conv-owned").await.unwrap().len(), 2);

    assert!(!chat.delete_conversation("conv-owned", "intruder").await.unwrap());
    assert!(chat.get_conversation("conv-owned", "owner").await.unwrap().is_some());
}

#[tokio::test]
async fn test_list_orders_by_recent_activity() {
    let db = create_test_database().await;
    let chat = db.chat();

    for (id, offset) in [("conv-a", 0), ("conv-b", 10)] {
        chat.save_exchange(
            id,
            "user-1",
            &message(&format!("{id}-q"), MessageRole::User, id, offset),
            &message(&format!("{id}-a"), MessageRole::Assistant, "ok", offset + 1),
        )
        .await
        .unwrap();
    }
    // Activity on the older conversation moves it to the top
    chat.save_exchange(
        "conv-a",
        "user-1",
        &message("conv-a-q2", MessageRole::User, "again", 20),
        &message("conv-a-a2", MessageRole::Assistant, "ok", 21),
    )
    .await
    .unwrap();

    let ids: Vec<String> = chat
        .list_conversations("user-1")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, ["conv-a", "conv-b"]);
}

#[tokio::test]
async fn test_delete_removes_messages() {
    let db = create_test_database().await;
    let chat = db.chat();

    chat.save_exchange(
        "conv-x",
        "user-1",
        &message("x1", MessageRole::User, "Bye", 0),
        &message("x2", MessageRole::Assistant, "Bye", 1),
    )
    .await
    .unwrap();

    assert!(chat.delete_conversation("conv-x", "user-1").await.unwrap());
    assert!(chat.get_conversation("conv-x", "user-1").await.unwrap().is_none());
    assert!(chat.get_messages("conv-x").await.unwrap().is_empty());
    assert!(!chat.delete_conversation("conv-x", "user-1").await.unwrap());
}
