//! # Bounded Undo Stack
//!
//! LIFO history with a fixed capacity. Pushing onto a full stack drops the
//! oldest entry. The durable trail in the store is unaffected by drops.
//!
//! ```text
//! capacity 3:   push a, b, c     [a, b, c]
//!               push d           [b, c, d]   (a dropped)
//!               pop → d          [b, c]
//! ```

use std::collections::VecDeque;

/// Default number of undoable operations kept in memory.
pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// A ring buffer used as a bounded stack.
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> UndoStack<T> {
    /// Creates a stack holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        UndoStack {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes an entry, returning the oldest one if it had to be dropped.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let dropped = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        dropped
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates newest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().rev()
    }
}

impl<T> Default for UndoStack<T> {
    fn default() -> Self {
        UndoStack::new(DEFAULT_UNDO_CAPACITY)
    }
}
