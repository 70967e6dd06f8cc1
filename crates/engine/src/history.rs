//! Undo/Redo history of full snapshots
//!
//! Each entry is a complete copy of the state before a change. Undo hands
//! back the previous snapshot in exchange for the current one; redo does the
//! reverse. Recording a new entry discards the redo stack. Only the undo
//! stack is bounded; the oldest entries drop silently.

use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct History<T> {
    undo_stack: VecDeque<T>,
    redo_stack: Vec<T>,
    max_entries: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record the state as it was before a change.
    pub fn record(&mut self, before: T) {
        self.redo_stack.clear();
        self.push_undo(before);
    }

    fn push_undo(&mut self, entry: T) {
        self.undo_stack.push_back(entry);

        // Limit history size
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }

    /// Step back. Returns the snapshot to restore; `current` moves to redo.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Step forward. Returns the snapshot to restore; `current` moves to undo.
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo_stack.pop()?;
        self.push_undo(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
