use chrono::Utc;

use crate::model::node::{
    NewNode, Node, NodeKind, NodePatch, TaskStatus, folder_color_by_index,
};
use crate::model::tree::{IdGenerator, Tree};
use crate::ops::TreeError;
use crate::ops::query::{depth_of, descendant_ids, folder_fits};
use crate::ops::siblings::{group_ids, insert_into_group};

/// Look up a node that must exist and not be soft-deleted.
pub(crate) fn live<'a>(tree: &'a Tree, id: &str) -> Result<&'a Node, TreeError> {
    let node = tree
        .get(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if node.is_deleted {
        return Err(TreeError::Deleted(id.to_string()));
    }
    Ok(node)
}

/// Look up a live folder.
pub(crate) fn live_folder<'a>(tree: &'a Tree, id: &str) -> Result<&'a Node, TreeError> {
    let node = live(tree, id)?;
    if !node.is_folder() {
        return Err(TreeError::NotAFolder(id.to_string()));
    }
    Ok(node)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Create a node under `parent` (root when `None`) and return a copy of it.
///
/// Folders are depth-checked and get the next palette colour unless `extra`
/// names one. The new node is appended to its zone of the sibling group.
pub fn create(
    tree: &mut Tree,
    ids: &mut IdGenerator,
    kind: NodeKind,
    parent: Option<&str>,
    title: &str,
    extra: NewNode,
    max_depth: usize,
) -> Result<Node, TreeError> {
    let depth = match parent {
        Some(parent_id) => {
            live_folder(tree, parent_id)?;
            depth_of(tree, parent_id) + 1
        }
        None => 0,
    };
    if kind == NodeKind::Folder && !folder_fits(depth, 0, max_depth) {
        return Err(TreeError::DepthExceeded { max: max_depth });
    }

    let id = ids.next_id(kind, tree);
    let mut node = Node::new(
        id.clone(),
        kind,
        title.to_string(),
        parent.map(String::from),
    );
    node.content = extra.content;
    if kind == NodeKind::Task
        && let Some(scheduled_at) = extra.scheduled_at
    {
        node.scheduled_at = Some(scheduled_at);
    }
    if kind == NodeKind::Folder {
        let live_folders = tree.iter().filter(|n| n.is_folder() && !n.is_deleted).count();
        node.color = Some(
            extra
                .color
                .unwrap_or_else(|| folder_color_by_index(live_folders).to_string()),
        );
    } else {
        node.color = extra.color;
    }

    let group = group_ids(tree, parent, None);
    tree.insert(node);
    insert_into_group(tree, group, &id, kind, usize::MAX);

    tree.get(&id)
        .cloned()
        .ok_or(TreeError::NotFound(id))
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

/// Shallow-merge `patch` into the node. Deleted nodes may still be edited.
pub fn update(tree: &mut Tree, id: &str, patch: &NodePatch) -> Result<(), TreeError> {
    let node = tree
        .get_mut(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if patch.is_empty() {
        return Err(TreeError::NothingToChange(id.to_string()));
    }
    patch.apply_to(node);
    Ok(())
}

/// Flip a folder's expanded flag; returns the new value.
pub fn toggle_expanded(tree: &mut Tree, id: &str) -> Result<bool, TreeError> {
    live_folder(tree, id)?;
    let node = tree
        .get_mut(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    node.is_expanded = !node.is_expanded;
    Ok(node.is_expanded)
}

/// Flip a task between TODO and DONE, stamping or clearing `completedAt`.
pub fn toggle_status(tree: &mut Tree, id: &str) -> Result<TaskStatus, TreeError> {
    let node = live(tree, id)?;
    if !node.is_task() {
        return Err(TreeError::NotATask(id.to_string()));
    }
    let node = tree
        .get_mut(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    let next = node.status.unwrap_or(TaskStatus::Todo).toggled();
    node.status = Some(next);
    node.completed_at = match next {
        TaskStatus::Done => Some(Utc::now()),
        TaskStatus::Todo => None,
    };
    Ok(next)
}

/// Mark every live, unfinished task below folder `id` as DONE with a single
/// completion stamp. Returns the ids that changed.
pub fn complete_folder(tree: &mut Tree, id: &str) -> Result<Vec<String>, TreeError> {
    live_folder(tree, id)?;
    let pending: Vec<String> = descendant_ids(tree, id)
        .into_iter()
        .filter(|d| {
            tree.get(d)
                .is_some_and(|n| n.is_task() && !n.is_deleted && !n.is_done())
        })
        .collect();
    if pending.is_empty() {
        return Err(TreeError::NothingToChange(id.to_string()));
    }
    let now = Utc::now();
    for task_id in &pending {
        if let Some(node) = tree.get_mut(task_id) {
            node.status = Some(TaskStatus::Done);
            node.completed_at = Some(now);
        }
    }
    Ok(pending)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
