//! Bounded buffer of the most recent turns.
//!
//! Sent to the chat service as lightweight context. The remote durable
//! history is authoritative; this buffer is a hint only.

use super::types::Turn;
use std::collections::VecDeque;

/// FIFO buffer holding at most `capacity` turns.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl RollingBuffer {
    /// Create an empty buffer that keeps the last `capacity` turns.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a turn, evicting the oldest ones while over capacity.
    pub fn push(&mut self, turn: Turn) {
        if self.capacity == 0 {
            return;
        }
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            let _ = self.turns.pop_front();
        }
    }

    /// Snapshot of the retained turns, oldest first.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Iterate retained turns, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Number of retained turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of retained turns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
