//! Reparenting and sibling reordering.
//!
//! Every entry point validates against the tree as it stands, then removes
//! the node from its old group, inserts it into the new one at a
//! zone-clamped index, and renumbers both groups.

use crate::model::node::Node;
use crate::model::tree::Tree;
use crate::ops::TreeError;
use crate::ops::node_ops::{live, live_folder};
use crate::ops::query::{
    OutdentTarget, depth_of, folder_fits, folder_subtree_depth, indent_target, is_descendant,
    outdent_target,
};
use crate::ops::siblings::{group_ids, insert_into_group, write_order};

/// Which side of the `over` node a dropped node lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPosition {
    #[default]
    Above,
    Below,
}

/// Make `active_id` the last child (within its zone) of `target_id`.
pub fn move_into(
    tree: &mut Tree,
    active_id: &str,
    target_id: &str,
    max_depth: usize,
) -> Result<(), TreeError> {
    let active = live(tree, active_id)?;
    live_folder(tree, target_id)?;
    if active.parent() == Some(target_id) {
        return Err(TreeError::AlreadyInPlace(active_id.to_string()));
    }
    check_destination(tree, active, Some(target_id), max_depth)?;
    relocate(tree, active_id, Some(target_id), usize::MAX);
    Ok(())
}

/// Move `active_id` to the root level, appended to its zone.
pub fn move_to_root(tree: &mut Tree, active_id: &str, max_depth: usize) -> Result<(), TreeError> {
    let active = live(tree, active_id)?;
    if active.parent().is_none() {
        return Err(TreeError::AlreadyInPlace(active_id.to_string()));
    }
    check_destination(tree, active, None, max_depth)?;
    relocate(tree, active_id, None, usize::MAX);
    Ok(())
}

/// Drop `active_id` above or below `over_id`.
///
/// Within one group the two nodes must be the same kind. Across groups the
/// node joins `over_id`'s parent, and the landing index is clamped to the
/// node's zone instead of being refused.
pub fn move_node(
    tree: &mut Tree,
    active_id: &str,
    over_id: &str,
    position: DropPosition,
    max_depth: usize,
) -> Result<(), TreeError> {
    if active_id == over_id {
        return Err(TreeError::AlreadyInPlace(active_id.to_string()));
    }
    let active = live(tree, active_id)?;
    let over = live(tree, over_id)?;
    if is_descendant(tree, active_id, over_id) {
        return Err(TreeError::Cycle {
            node: active_id.to_string(),
            target: over_id.to_string(),
        });
    }

    let new_parent = over.parent().map(String::from);
    if active.parent() == new_parent.as_deref() {
        if active.kind != over.kind {
            return Err(TreeError::ZoneMismatch {
                node: active_id.to_string(),
                over: over_id.to_string(),
            });
        }
        let mut group = group_ids(tree, new_parent.as_deref(), Some(active_id));
        let over_idx = drop_index(&group, over_id, position);
        group.insert(over_idx, active_id.to_string());
        write_order(tree, &group);
        return Ok(());
    }

    check_destination(tree, active, new_parent.as_deref(), max_depth)?;
    let group = group_ids(tree, new_parent.as_deref(), Some(active_id));
    let index = drop_index(&group, over_id, position);
    relocate(tree, active_id, new_parent.as_deref(), index);
    Ok(())
}

/// Move `id` into the nearest folder sibling above it.
pub fn indent(tree: &mut Tree, id: &str, max_depth: usize) -> Result<(), TreeError> {
    live(tree, id)?;
    let target = indent_target(tree, id)
        .map(String::from)
        .ok_or_else(|| TreeError::NoIndentTarget(id.to_string()))?;
    move_into(tree, id, &target, max_depth)
}

/// Move `id` up one level: into its grandparent, or to the root.
pub fn outdent(tree: &mut Tree, id: &str, max_depth: usize) -> Result<(), TreeError> {
    live(tree, id)?;
    match outdent_target(tree, id) {
        None => Err(TreeError::AlreadyInPlace(id.to_string())),
        Some(OutdentTarget::Root) => move_to_root(tree, id, max_depth),
        Some(OutdentTarget::Folder(grandparent)) => {
            let grandparent = grandparent.to_string();
            move_into(tree, id, &grandparent, max_depth)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Cycle and depth checks for moving `active` under `new_parent`.
fn check_destination(
    tree: &Tree,
    active: &Node,
    new_parent: Option<&str>,
    max_depth: usize,
) -> Result<(), TreeError> {
    if let Some(parent_id) = new_parent {
        let parent = live_folder(tree, parent_id)?;
        if parent.id == active.id || is_descendant(tree, &active.id, parent_id) {
            return Err(TreeError::Cycle {
                node: active.id.clone(),
                target: parent_id.to_string(),
            });
        }
    }
    // Every folder travelling with `active` must land where create would
    // accept it. Tasks add no folder level.
    if active.is_folder() {
        let depth = new_parent.map_or(0, |p| depth_of(tree, p) + 1);
        if !folder_fits(depth, folder_subtree_depth(tree, &active.id), max_depth) {
            return Err(TreeError::DepthExceeded { max: max_depth });
        }
    }
    Ok(())
}

/// Index just before or after `over_id` in `group`; the end if it is absent.
fn drop_index(group: &[String], over_id: &str, position: DropPosition) -> usize {
    match group.iter().position(|id| id == over_id) {
        Some(i) if position == DropPosition::Below => i + 1,
        Some(i) => i,
        None => group.len(),
    }
}

/// Detach `id` from its group, attach it under `new_parent` near `index`,
/// and renumber both groups.
fn relocate(tree: &mut Tree, id: &str, new_parent: Option<&str>, index: usize) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let kind = node.kind;
    let old_parent = node.parent().map(String::from);

    let old_group = group_ids(tree, old_parent.as_deref(), Some(id));
    write_order(tree, &old_group);

    let new_group = group_ids(tree, new_parent, Some(id));
    if let Some(node) = tree.get_mut(id) {
        node.parent_id = new_parent.map(String::from);
    }
    insert_into_group(tree, new_group, id, kind, index);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
