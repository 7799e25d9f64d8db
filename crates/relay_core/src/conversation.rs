//! Bounded conversation memory.
//!
//! The window holds completed user/assistant pairs, oldest first. Between
//! `append_user` and `append_assistant` exactly one unanswered user turn sits
//! at the newest position; every other state has an even length with roles
//! alternating `User, Assistant, ...`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug)]
pub struct ConversationStore {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationStore {
    /// `max_turns` is expected to be even; odd values are rounded down.
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns - max_turns % 2;
        Self {
            turns: VecDeque::with_capacity(max_turns + 2),
            max_turns,
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn newest_role(&self) -> Option<Role> {
        self.turns.back().map(|turn| turn.role)
    }

    /// Record the user's side of a new exchange.
    pub fn append_user(&mut self, text: impl Into<String>) -> Result<()> {
        if self.newest_role() == Some(Role::User) {
            return Err(RelayError::ConversationCorrupted(
                "a user turn is already waiting for a reply".to_string(),
            ));
        }
        self.turns.push_back(Turn::user(text));
        Ok(())
    }

    /// Record the reply to the pending user turn.
    pub fn append_assistant(&mut self, text: impl Into<String>) -> Result<()> {
        if self.newest_role() != Some(Role::User) {
            return Err(RelayError::ConversationCorrupted(
                "assistant turn without a pending user turn".to_string(),
            ));
        }
        self.turns.push_back(Turn::assistant(text));
        Ok(())
    }

    /// Drop the unanswered user turn left behind by a failed exchange.
    pub fn rollback_pending_user(&mut self) -> Option<Turn> {
        if self.newest_role() == Some(Role::User) {
            self.turns.pop_back()
        } else {
            None
        }
    }

    /// Evict the oldest pair once the window has grown past capacity, then
    /// verify the pairing invariant.
    pub fn trim_if_needed(&mut self) -> Result<()> {
        if self.turns.len() >= self.max_turns + 2 {
            self.turns.pop_front();
            self.turns.pop_front();
            log::debug!(
                "Conversation window full, evicted oldest pair ({} turns kept)",
                self.turns.len()
            );
        }
        self.check_invariant()
    }

    pub fn check_invariant(&self) -> Result<()> {
        if self.turns.len() % 2 != 0 {
            return Err(RelayError::ConversationCorrupted(format!(
                "odd window length {}",
                self.turns.len()
            )));
        }
        if self.turns.len() > self.max_turns {
            return Err(RelayError::ConversationCorrupted(format!(
                "window length {} exceeds capacity {}",
                self.turns.len(),
                self.max_turns
            )));
        }
        for (index, turn) in self.turns.iter().enumerate() {
            let expected = if index % 2 == 0 { Role::User } else { Role::Assistant };
            if turn.role != expected {
                return Err(RelayError::ConversationCorrupted(format!(
                    "turn {index} is {:?}, expected {expected:?}",
                    turn.role
                )));
            }
        }
        Ok(())
    }

    /// Turns oldest to newest, as sent upstream.
    pub fn to_ordered_slice(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
