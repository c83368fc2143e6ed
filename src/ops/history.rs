//! Snapshot undo/redo.
//!
//! Each recorded mutation stores the whole tree as it was before the change.
//! Both stacks are bounded; the oldest snapshot falls off first.

use serde::{Deserialize, Serialize};

use crate::model::config::DEFAULT_HISTORY_LIMIT;
use crate::model::tree::Tree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    undo: Vec<Tree>,
    #[serde(default)]
    redo: Vec<Tree>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Push the pre-mutation snapshot. Clears the redo branch.
    pub fn record(&mut self, before: Tree) {
        self.undo.push(before);
        trim(&mut self.undo, self.limit);
        self.redo.clear();
    }

    /// Swap `current` with the last undo snapshot. Returns false when there
    /// is nothing to undo.
    pub fn undo(&mut self, current: &mut Tree) -> bool {
        let Some(snapshot) = self.undo.pop() else {
            return false;
        };
        self.redo.push(std::mem::replace(current, snapshot));
        trim(&mut self.redo, self.limit);
        true
    }

    /// Swap `current` with the last redo snapshot. Returns false when there
    /// is nothing to redo.
    pub fn redo(&mut self, current: &mut Tree) -> bool {
        let Some(snapshot) = self.redo.pop() else {
            return false;
        };
        self.undo.push(std::mem::replace(current, snapshot));
        trim(&mut self.undo, self.limit);
        true
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the bound, dropping the oldest snapshots if the stacks are
    /// already past it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        trim(&mut self.undo, limit);
        trim(&mut self.redo, limit);
    }
}

fn trim(stack: &mut Vec<Tree>, limit: usize) {
    if stack.len() > limit {
        stack.drain(..stack.len() - limit);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{sample_tree, task};

    fn with_task(tree: &Tree, id: &str) -> Tree {
        let mut next = tree.clone();
        next.insert(task(id, None, next.len()));
        next
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut history = History::default();
        let start = sample_tree();
        let mut current = start.clone();
        let next = with_task(&current, "x");
        history.record(std::mem::replace(&mut current, next.clone()));

        assert!(history.undo(&mut current));
        assert_eq!(current, start);
        assert!(history.redo(&mut current));
        assert_eq!(current, next);
    }

    #[test]
    fn underflow_is_a_no_op() {
        let mut history = History::default();
        let start = sample_tree();
        let mut current = start.clone();
        assert!(!history.undo(&mut current));
        assert!(!history.redo(&mut current));
        assert_eq!(current, start);
    }

    #[test]
    fn record_clears_redo() {
        let mut history = History::default();
        let mut current = sample_tree();
        history.record(current.clone());
        current = with_task(&current, "a");
        history.undo(&mut current);
        assert!(history.can_redo());
        history.record(current.clone());
        assert!(!history.can_redo());
    }

    #[test]
    fn oldest_snapshot_evicted() {
        let mut history = History::new(3);
        let mut current = Tree::new();
        for i in 0..5 {
            let next = with_task(&current, &format!("t{}", i));
            history.record(std::mem::replace(&mut current, next));
        }
        assert_eq!(history.undo_len(), 3);
        while history.undo(&mut current) {}
        // two tasks could not be undone
        assert_eq!(current.len(), 2);
        assert_eq!(history.redo_len(), 3);
    }

    #[test]
    fn set_limit_trims() {
        let mut history = History::new(10);
        for _ in 0..6 {
            history.record(Tree::new());
        }
        history.set_limit(4);
        assert_eq!(history.undo_len(), 4);
    }

    #[test]
    fn serializes_with_limit() {
        let mut history = History::new(7);
        history.record(sample_tree());
        let json = serde_json::to_string(&history).unwrap();
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
        let bare: History = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.limit(), DEFAULT_HISTORY_LIMIT);
    }
}
