use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::model::tree::Tree;
use crate::ops::TreeError;
use crate::ops::query::{ancestors, depth_of, descendant_ids, folder_fits};
use crate::ops::siblings::{compact, normalize};

/// Soft-delete `id` and every live node below it.
///
/// The batch shares one `deletedAt`, later than any stamp already in the
/// tree, so `restore` can tell it apart from earlier deletions. Returns the
/// ids that were marked.
pub fn soft_delete(tree: &mut Tree, id: &str) -> Result<Vec<String>, TreeError> {
    let node = tree
        .get(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if node.is_deleted {
        return Err(TreeError::AlreadyDeleted(id.to_string()));
    }
    let parent = node.parent().map(String::from);

    let mut batch = vec![id.to_string()];
    batch.extend(
        descendant_ids(tree, id)
            .into_iter()
            .filter(|d| tree.get(d).is_some_and(|n| !n.is_deleted)),
    );

    let stamp = next_deletion_stamp(tree);
    for deleted_id in &batch {
        if let Some(node) = tree.get_mut(deleted_id) {
            node.is_deleted = true;
            node.deleted_at = Some(stamp);
        }
    }
    compact(tree, parent.as_deref());
    Ok(batch)
}

/// Undo a soft-delete of `id`.
///
/// Restores `id`, the descendants deleted in the same batch, and any deleted
/// ancestors. Descendants deleted separately stay in the trash. Returned
/// nodes rejoin their groups near their old slot.
///
/// A live ancestor may have moved deeper while the batch sat in the trash,
/// so every returning folder is checked against `max_depth` again.
pub fn restore(tree: &mut Tree, id: &str, max_depth: usize) -> Result<Vec<String>, TreeError> {
    let node = tree
        .get(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if !node.is_deleted {
        return Err(TreeError::NotDeleted(id.to_string()));
    }
    let batch = node.deleted_at;

    let mut restored = vec![id.to_string()];
    collect_batch(tree, id, batch, &mut restored);
    restored.extend(
        ancestors(tree, id)
            .into_iter()
            .filter(|a| a.is_deleted)
            .map(|a| a.id.clone()),
    );
    let too_deep = restored.iter().any(|r| {
        tree.get(r)
            .is_some_and(|n| n.is_folder() && !folder_fits(depth_of(tree, r), 0, max_depth))
    });
    if too_deep {
        return Err(TreeError::DepthExceeded { max: max_depth });
    }

    let mut groups: BTreeSet<Option<String>> = BTreeSet::new();
    for restored_id in &restored {
        if let Some(node) = tree.get_mut(restored_id) {
            node.is_deleted = false;
            node.deleted_at = None;
            groups.insert(node.parent_id.clone());
        }
    }

    let returning: HashSet<String> = restored.iter().cloned().collect();
    for parent in &groups {
        normalize(tree, parent.as_deref(), &returning);
    }
    Ok(restored)
}

/// Remove `id` and everything below it from the tree, whatever their
/// deletion state. Returns the removed ids.
pub fn permanent_delete(tree: &mut Tree, id: &str) -> Result<Vec<String>, TreeError> {
    let node = tree
        .get(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    let parent = node.parent().map(String::from);
    let was_live = !node.is_deleted;

    let mut removed = vec![id.to_string()];
    removed.extend(descendant_ids(tree, id));
    for removed_id in &removed {
        tree.remove(removed_id);
    }
    if was_live {
        compact(tree, parent.as_deref());
    }
    Ok(removed)
}

/// Depth-first walk collecting deleted children stamped with `batch`.
/// Children from another batch (or live ones) end the walk on that branch.
fn collect_batch(tree: &Tree, id: &str, batch: Option<DateTime<Utc>>, out: &mut Vec<String>) {
    let children: Vec<String> = tree
        .iter()
        .filter(|n| n.parent() == Some(id) && n.is_deleted && n.deleted_at == batch)
        .map(|n| n.id.clone())
        .collect();
    for child in children {
        if out.contains(&child) {
            continue;
        }
        out.push(child.clone());
        collect_batch(tree, &child, batch, out);
    }
}

fn next_deletion_stamp(tree: &Tree) -> DateTime<Utc> {
    let now = Utc::now();
    match tree.iter().filter_map(|n| n.deleted_at).max() {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{child_ids, folder, orders, sample_tree, task};
    use pretty_assertions::assert_eq;

    fn deleted(tree: &Tree, id: &str) -> bool {
        tree.get(id).unwrap().is_deleted
    }

    #[test]
    fn soft_delete_cascades_and_compacts() {
        let mut tree = sample_tree();
        let batch = soft_delete(&mut tree, "proj").unwrap();
        assert_eq!(batch, vec!["proj", "p1"]);
        assert!(deleted(&tree, "p1"));
        let stamp = tree.get("proj").unwrap().deleted_at;
        assert!(stamp.is_some());
        assert_eq!(tree.get("p1").unwrap().deleted_at, stamp);
        assert_eq!(
            orders(&tree, Some("work")),
            vec![("t1".into(), 0), ("t2".into(), 1)]
        );
        // the deleted node keeps its place
        assert_eq!(tree.get("proj").unwrap().parent(), Some("work"));
        assert_eq!(tree.get("proj").unwrap().order, 0);
    }

    #[test]
    fn soft_delete_twice_is_refused() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "t1").unwrap();
        let before = tree.clone();
        assert_eq!(
            soft_delete(&mut tree, "t1"),
            Err(TreeError::AlreadyDeleted("t1".into()))
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn restore_brings_back_ancestors() {
        let mut tree = Tree::from_nodes(vec![
            folder("A", None, 0),
            folder("B", Some("A"), 0),
            task("C", Some("B"), 0),
        ]);
        soft_delete(&mut tree, "A").unwrap();
        assert!(deleted(&tree, "C"));
        restore(&mut tree, "C", 5).unwrap();
        assert!(!deleted(&tree, "A"));
        assert!(!deleted(&tree, "B"));
        assert!(!deleted(&tree, "C"));
    }

    #[test]
    fn restore_returns_node_to_its_slot() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "t1").unwrap();
        assert_eq!(child_ids(&tree, Some("work")), vec!["proj", "t2"]);
        restore(&mut tree, "t1", 5).unwrap();
        assert_eq!(
            orders(&tree, Some("work")),
            vec![("proj".into(), 0), ("t1".into(), 1), ("t2".into(), 2)]
        );
    }

    #[test]
    fn restore_keeps_separately_deleted_descendants() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "t1").unwrap();
        soft_delete(&mut tree, "work").unwrap();
        let restored = restore(&mut tree, "work", 5).unwrap();
        assert!(!restored.contains(&"t1".to_string()));
        assert!(deleted(&tree, "t1"));
        assert!(!deleted(&tree, "p1"));
        assert_eq!(child_ids(&tree, Some("work")), vec!["proj", "t2"]);
    }

    #[test]
    fn restore_live_node_refused() {
        let mut tree = sample_tree();
        assert_eq!(
            restore(&mut tree, "t1", 5),
            Err(TreeError::NotDeleted("t1".into()))
        );
    }

    #[test]
    fn restore_refuses_folder_pushed_too_deep() {
        let mut tree = Tree::from_nodes(vec![
            folder("x", None, 0),
            folder("a", None, 1),
            folder("b", Some("a"), 0),
        ]);
        soft_delete(&mut tree, "b").unwrap();
        crate::ops::move_ops::move_into(&mut tree, "a", "x", 3).unwrap();
        let before = tree.clone();
        assert_eq!(
            restore(&mut tree, "b", 3),
            Err(TreeError::DepthExceeded { max: 3 })
        );
        assert_eq!(tree, before);
        restore(&mut tree, "b", 4).unwrap();
    }

    #[test]
    fn restored_node_wins_ties_with_newcomers() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "home").unwrap();
        tree.insert(folder("new", None, 1));
        tree.get_mut("inbox1").unwrap().order = 2;
        restore(&mut tree, "home", 5).unwrap();
        assert_eq!(child_ids(&tree, None), vec!["work", "home", "new", "inbox1"]);
    }

    #[test]
    fn restored_folder_stays_in_folder_zone() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "home").unwrap();
        tree.get_mut("home").unwrap().order = 5;
        restore(&mut tree, "home", 5).unwrap();
        assert_eq!(
            orders(&tree, None),
            vec![("work".into(), 0), ("home".into(), 1), ("inbox1".into(), 2)]
        );
    }

    #[test]
    fn permanent_delete_removes_everything_below() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "p1").unwrap();
        let removed = permanent_delete(&mut tree, "work").unwrap();
        assert_eq!(removed, vec!["work", "proj", "t1", "t2", "p1"]);
        assert!(!tree.contains("p1"));
        assert_eq!(
            orders(&tree, None),
            vec![("home".into(), 0), ("inbox1".into(), 1)]
        );
    }

    #[test]
    fn stamps_increase_between_batches() {
        let mut tree = sample_tree();
        soft_delete(&mut tree, "t1").unwrap();
        soft_delete(&mut tree, "t2").unwrap();
        let first = tree.get("t1").unwrap().deleted_at.unwrap();
        let second = tree.get("t2").unwrap().deleted_at.unwrap();
        assert!(second > first);
    }
}
