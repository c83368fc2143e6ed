//! The facade the UI talks to.
//!
//! Every mutating call runs against a clone of the current tree. Only when
//! the op succeeds is the clone committed, the old tree pushed onto the undo
//! stack, and the change handed to the store mirror. A refused op leaves
//! tree, history and store untouched.

use crate::io::mirror::StoreMirror;
use crate::model::config::ArborConfig;
use crate::model::node::{NewNode, Node, NodeKind, NodePatch, TaskStatus};
use crate::model::tree::{IdGenerator, Tree};
use crate::ops::history::History;
use crate::ops::move_ops::DropPosition;
use crate::ops::query::{self, VisibleNode};
use crate::ops::{TreeError, delete_ops, move_ops, node_ops};

/// How a committed change reaches the store
enum SyncScope {
    /// Rewrite the whole collection
    Full,
    /// Upsert just these nodes
    Nodes(Vec<String>),
    /// Drop these ids
    Removed(Vec<String>),
}

pub struct Outliner {
    tree: Tree,
    history: History,
    ids: IdGenerator,
    max_depth: usize,
    mirror: Option<StoreMirror>,
}

impl Default for Outliner {
    fn default() -> Self {
        Outliner::new(Tree::new(), &ArborConfig::default())
    }
}

impl Outliner {
    /// Wrap a loaded tree. The id generator is seeded past every id in it.
    pub fn new(tree: Tree, config: &ArborConfig) -> Self {
        Outliner {
            ids: IdGenerator::after(&tree),
            tree,
            history: History::new(config.history.limit),
            max_depth: config.tree.max_depth,
            mirror: None,
        }
    }

    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Resume a saved history. Its bound is reset to the configured one.
    pub fn with_history(mut self, mut history: History) -> Self {
        history.set_limit(self.history.limit());
        self.history = history;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Mirror every committed change into `mirror` from now on.
    pub fn attach_mirror(&mut self, mirror: StoreMirror) {
        self.mirror = Some(mirror);
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.tree.get(id)
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    pub fn create(
        &mut self,
        kind: NodeKind,
        parent: Option<&str>,
        title: &str,
        extra: NewNode,
    ) -> Result<Node, TreeError> {
        let max_depth = self.max_depth;
        self.apply("create", SyncScope::Full, |tree, ids| {
            node_ops::create(tree, ids, kind, parent, title, extra, max_depth)
        })
    }

    pub fn update(&mut self, id: &str, patch: &NodePatch) -> Result<(), TreeError> {
        self.apply("update", SyncScope::Nodes(vec![id.to_string()]), |tree, _| {
            node_ops::update(tree, id, patch)
        })
    }

    /// Expand or collapse a folder. View state only: not recorded in history.
    pub fn toggle_expanded(&mut self, id: &str) -> Result<bool, TreeError> {
        let expanded = node_ops::toggle_expanded(&mut self.tree, id).inspect_err(|e| {
            tracing::debug!(op = "toggle_expanded", id, error = %e, "rejected");
        })?;
        self.mirror(SyncScope::Nodes(vec![id.to_string()]));
        Ok(expanded)
    }

    pub fn toggle_status(&mut self, id: &str) -> Result<TaskStatus, TreeError> {
        self.apply(
            "toggle_status",
            SyncScope::Nodes(vec![id.to_string()]),
            |tree, _| node_ops::toggle_status(tree, id),
        )
    }

    pub fn complete_folder(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        self.apply("complete_folder", SyncScope::Full, |tree, _| {
            node_ops::complete_folder(tree, id)
        })
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    pub fn move_into(&mut self, active_id: &str, target_id: &str) -> Result<(), TreeError> {
        let max_depth = self.max_depth;
        self.apply("move_into", SyncScope::Full, |tree, _| {
            move_ops::move_into(tree, active_id, target_id, max_depth)
        })
    }

    pub fn move_to_root(&mut self, active_id: &str) -> Result<(), TreeError> {
        let max_depth = self.max_depth;
        self.apply("move_to_root", SyncScope::Full, |tree, _| {
            move_ops::move_to_root(tree, active_id, max_depth)
        })
    }

    pub fn move_node(
        &mut self,
        active_id: &str,
        over_id: &str,
        position: DropPosition,
    ) -> Result<(), TreeError> {
        let max_depth = self.max_depth;
        self.apply("move_node", SyncScope::Full, |tree, _| {
            move_ops::move_node(tree, active_id, over_id, position, max_depth)
        })
    }

    pub fn indent(&mut self, id: &str) -> Result<(), TreeError> {
        let max_depth = self.max_depth;
        self.apply("indent", SyncScope::Full, |tree, _| {
            move_ops::indent(tree, id, max_depth)
        })
    }

    pub fn outdent(&mut self, id: &str) -> Result<(), TreeError> {
        let max_depth = self.max_depth;
        self.apply("outdent", SyncScope::Full, |tree, _| {
            move_ops::outdent(tree, id, max_depth)
        })
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    pub fn soft_delete(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        self.apply("soft_delete", SyncScope::Full, |tree, _| {
            delete_ops::soft_delete(tree, id)
        })
    }

    pub fn restore(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        let max_depth = self.max_depth;
        self.apply("restore", SyncScope::Full, |tree, _| {
            delete_ops::restore(tree, id, max_depth)
        })
    }

    /// Remove `id` and its subtree for good. Bypasses history and empties it,
    /// since older snapshots would bring the purged nodes back.
    pub fn permanent_delete(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        let mut next = self.tree.clone();
        let removed = delete_ops::permanent_delete(&mut next, id).inspect_err(|e| {
            tracing::debug!(op = "permanent_delete", id, error = %e, "rejected");
        })?;
        self.tree = next;
        self.history.clear();
        self.mirror(SyncScope::Removed(removed.clone()));
        self.mirror(SyncScope::Full);
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    pub fn undo(&mut self) -> Result<(), TreeError> {
        if !self.history.undo(&mut self.tree) {
            return Err(TreeError::NothingToUndo);
        }
        self.mirror(SyncScope::Full);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), TreeError> {
        if !self.history.redo(&mut self.tree) {
            return Err(TreeError::NothingToRedo);
        }
        self.mirror(SyncScope::Full);
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn children_of(&self, parent: Option<&str>) -> Vec<&Node> {
        query::children_of(&self.tree, parent)
    }

    pub fn depth_of(&self, id: &str) -> usize {
        query::depth_of(&self.tree, id)
    }

    pub fn visible_nodes(&self) -> Vec<VisibleNode<'_>> {
        query::visible_nodes(&self.tree)
    }

    pub fn deleted_nodes(&self) -> Vec<&Node> {
        query::deleted_nodes(&self.tree)
    }

    /// Block until the store has caught up with every committed change.
    pub fn flush(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.flush();
        }
    }

    // -----------------------------------------------------------------------
    // Commit path
    // -----------------------------------------------------------------------

    fn apply<T>(
        &mut self,
        op: &'static str,
        sync: SyncScope,
        f: impl FnOnce(&mut Tree, &mut IdGenerator) -> Result<T, TreeError>,
    ) -> Result<T, TreeError> {
        let mut next = self.tree.clone();
        match f(&mut next, &mut self.ids) {
            Ok(value) => {
                let before = std::mem::replace(&mut self.tree, next);
                self.history.record(before);
                tracing::debug!(op, nodes = self.tree.len(), "committed");
                self.mirror(sync);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(op, error = %e, "rejected");
                Err(e)
            }
        }
    }

    fn mirror(&self, sync: SyncScope) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        match sync {
            SyncScope::Full => mirror.replace_all(self.tree.to_vec()),
            SyncScope::Nodes(ids) => mirror.upsert(
                ids.iter()
                    .filter_map(|id| self.tree.get(id).cloned())
                    .collect(),
            ),
            SyncScope::Removed(ids) => mirror.delete(ids),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
