//! The outgoing message queue.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use grid_core::{Host, Message};

/// A message waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    /// The message.
    pub message: Message,

    /// Where it goes.
    pub endpoint: Host,

    /// Whether to send it reliably.
    pub reliable: bool,
}

/// FIFO queue with a jump-the-line insert.
///
/// Written by any caller, drained by the packet loop.
#[derive(Debug, Default)]
pub struct OutgoingQueue {
    entries: Mutex<VecDeque<Outgoing>>,
}

impl OutgoingQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Outgoing>> {
        // Entries are plain data; a panicked writer cannot leave one half-built.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail.
    pub fn push_back(&self, entry: Outgoing) {
        self.entries().push_back(entry);
    }

    /// Insert at the head, ahead of everything already queued.
    pub fn push_front(&self, entry: Outgoing) {
        self.entries().push_front(entry);
    }

    /// Take the head entry.
    pub fn pop(&self) -> Option<Outgoing> {
        self.entries().pop_front()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
