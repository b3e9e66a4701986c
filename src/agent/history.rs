//! Bounded per-user conversation history.

use std::collections::VecDeque;

use crate::llm::ChatMessage;

/// Maximum entries kept per user. Oldest are evicted first.
pub const STORED_CAP: usize = 20;

/// Entries sent to the backend on the primary call.
pub const PRIMARY_WINDOW: usize = 10;

/// FIFO-bounded conversation history for one identity.
///
/// Only user-visible turns land here — the router appends exactly the user
/// message and the final assistant reply after a request completes.
/// Intermediate tool-call and tool-result messages stay in the request's
/// local buffer.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<ChatMessage>,
    cap: usize,
}

impl ConversationHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ChatMessage> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(STORED_CAP)
    }
}
