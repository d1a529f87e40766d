// ABOUTME: Per-conversation processing state for in-flight chat questions
// ABOUTME: Watch channels feed the state endpoint and SSE stream; a guard resets to idle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use dashmap::DashMap;
use tokio::sync::watch;

use semantc_core::models::ProcessingState;

/// Channels are scoped to one user's conversation
type StateKey = (String, String);

fn key(user_id: &str, conversation_id: &str) -> StateKey {
    (user_id.to_owned(), conversation_id.to_owned())
}

/// In-memory processing states keyed by user and conversation
#[derive(Default)]
pub struct ProcessingTracker {
    channels: DashMap<StateKey, watch::Sender<ProcessingState>>,
}

impl ProcessingTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a conversation (idle if never seen)
    #[must_use]
    pub fn current(&self, user_id: &str, conversation_id: &str) -> ProcessingState {
        self.channels
            .get(&key(user_id, conversation_id))
            .map_or(ProcessingState::Idle, |sender| *sender.borrow())
    }

    /// Receiver that yields every state change of a conversation
    #[must_use]
    pub fn subscribe(&self, user_id: &str, conversation_id: &str) -> watch::Receiver<ProcessingState> {
        self.channels
            .entry(key(user_id, conversation_id))
            .or_insert_with(|| watch::channel(ProcessingState::Idle).0)
            .subscribe()
    }

    fn set(&self, key: &StateKey, state: ProcessingState) {
        self.channels
            .entry(key.clone())
            .or_insert_with(|| watch::channel(ProcessingState::Idle).0)
            .send_replace(state);
    }

    /// Mark a conversation as processing until the returned guard drops
    #[must_use]
    pub fn begin(&self, user_id: &str, conversation_id: &str) -> ProcessingGuard<'_> {
        let key = key(user_id, conversation_id);
        self.set(&key, ProcessingState::Understanding);
        ProcessingGuard { tracker: self, key }
    }

    #[cfg(test)]
    fn live_channels(&self) -> usize {
        self.channels.len()
    }
}

/// Returns the conversation to [`ProcessingState::Idle`] on drop, on every exit path
pub struct ProcessingGuard<'a> {
    tracker: &'a ProcessingTracker,
    key: StateKey,
}

impl ProcessingGuard<'_> {
    /// Move to the next state
    pub fn advance(&self, state: ProcessingState) {
        self.tracker.set(&self.key, state);
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.tracker.set(&self.key, ProcessingState::Idle);
        // Idle channels nobody listens to carry no information
        self.tracker
            .channels
            .remove_if(&self.key, |_, sender| sender.receiver_count() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_resets_to_idle() {
        let tracker = ProcessingTracker::new();
        let rx = tracker.subscribe("u1", "c1");
        {
            let guard = tracker.begin("u1", "c1");
            assert_eq!(tracker.current("u1", "c1"), ProcessingState::Understanding);
            guard.advance(ProcessingState::Querying);
            assert_eq!(*rx.borrow(), ProcessingState::Querying);
        }
        assert_eq!(tracker.current("u1", "c1"), ProcessingState::Idle);
        assert_eq!(tracker.current("nobody", "c1"), ProcessingState::Idle);
    }

    #[test]
    fn conversations_are_independent() {
        let tracker = ProcessingTracker::new();
        let first = tracker.begin("u1", "a");
        first.advance(ProcessingState::Querying);
        {
            let second = tracker.begin("u1", "b");
            second.advance(ProcessingState::Answering);
            assert_eq!(tracker.current("u1", "a"), ProcessingState::Querying);
        }
        assert_eq!(tracker.current("u1", "b"), ProcessingState::Idle);
        assert_eq!(tracker.current("u1", "a"), ProcessingState::Querying);
        assert_eq!(tracker.current("u2", "a"), ProcessingState::Idle);
    }

    #[test]
    fn unobserved_channels_are_dropped() {
        let tracker = ProcessingTracker::new();
        drop(tracker.begin("u1", "a"));
        assert_eq!(tracker.live_channels(), 0);

        let _rx = tracker.subscribe("u1", "b");
        drop(tracker.begin("u1", "b"));
        assert_eq!(tracker.live_channels(), 1);
    }
}
