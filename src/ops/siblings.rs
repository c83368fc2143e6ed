//! Sibling-group bookkeeping shared by the mutating ops: zone clamping and
//! dense renumbering.

use std::collections::HashSet;

use crate::model::node::NodeKind;
use crate::model::tree::Tree;
use crate::ops::query::children_of;

/// Ids of the live group under `parent` in order, leaving out `except`.
pub(crate) fn group_ids(tree: &Tree, parent: Option<&str>, except: Option<&str>) -> Vec<String> {
    children_of(tree, parent)
        .into_iter()
        .filter(|n| Some(n.id.as_str()) != except)
        .map(|n| n.id.clone())
        .collect()
}

/// Index of the first task in `group`, or `group.len()` if there is none.
pub(crate) fn first_task_index(tree: &Tree, group: &[String]) -> usize {
    group
        .iter()
        .position(|id| tree.get(id).is_some_and(|n| n.is_task()))
        .unwrap_or(group.len())
}

/// Pull `index` into the zone `kind` belongs to: tasks never land before the
/// first task, folders never land after the last folder.
pub(crate) fn clamp_to_zone(tree: &Tree, group: &[String], kind: NodeKind, index: usize) -> usize {
    let index = index.min(group.len());
    let boundary = first_task_index(tree, group);
    match kind {
        NodeKind::Task => index.max(boundary),
        NodeKind::Folder => index.min(boundary),
    }
}

/// Insert `id` into `group` at its zone-clamped `index` and renumber.
pub(crate) fn insert_into_group(
    tree: &mut Tree,
    mut group: Vec<String>,
    id: &str,
    kind: NodeKind,
    index: usize,
) {
    let at = clamp_to_zone(tree, &group, kind, index);
    group.insert(at, id.to_string());
    write_order(tree, &group);
}

/// Set `order` to each id's position in `group`.
pub(crate) fn write_order(tree: &mut Tree, group: &[String]) {
    for (order, id) in group.iter().enumerate() {
        if let Some(node) = tree.get_mut(id) {
            node.order = order;
        }
    }
}

/// Compact the live group under `parent` back to `0..n`.
pub(crate) fn compact(tree: &mut Tree, parent: Option<&str>) {
    let group = group_ids(tree, parent, None);
    write_order(tree, &group);
}

/// Re-derive a dense, zone-separated order for the live group under
/// `parent`. Nodes in `returning` win ties on `order` against nodes that
/// stayed, then folders are moved ahead of tasks keeping relative order.
pub(crate) fn normalize(tree: &mut Tree, parent: Option<&str>, returning: &HashSet<String>) {
    let mut group: Vec<(usize, bool, bool, String)> = children_of(tree, parent)
        .into_iter()
        .map(|n| (n.order, returning.contains(&n.id), n.is_task(), n.id.clone()))
        .collect();
    group.sort_by_key(|(order, back, _, _)| (*order, !*back));
    group.sort_by_key(|(_, _, is_task, _)| *is_task);
    let ids: Vec<String> = group.into_iter().map(|(_, _, _, id)| id).collect();
    write_order(tree, &ids);
}
