//! Read-only derivations over a [`Tree`]: sibling lists, depths, the
//! visible-row ordering, and the lookups keyboard navigation needs.
//!
//! Nothing here caches. Depths and child lists are recomputed from the
//! `parent_id` links on every call.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::node::{INBOX_COLOR, Node};
use crate::model::tree::Tree;

/// A row in the flattened outline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleNode<'a> {
    pub node: &'a Node,
    /// Ancestor hops (root-level = 0)
    pub depth: usize,
}

/// Keyboard selection direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Where an outdented node goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutdentTarget<'a> {
    Root,
    Folder(&'a str),
}

// ---------------------------------------------------------------------------
// Sibling groups
// ---------------------------------------------------------------------------

/// Live (non-deleted) children of `parent`, in sibling order.
/// `None` means the root level.
pub fn children_of<'a>(tree: &'a Tree, parent: Option<&str>) -> Vec<&'a Node> {
    let mut children: Vec<&Node> = tree
        .iter()
        .filter(|n| !n.is_deleted && n.parent() == parent)
        .collect();
    children.sort_by_key(|n| n.order);
    children
}

/// Live children of every parent at once, each list in sibling order.
pub fn child_index(tree: &Tree) -> HashMap<Option<&str>, Vec<&Node>> {
    let mut index: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();
    for node in tree.iter().filter(|n| !n.is_deleted) {
        index.entry(node.parent()).or_default().push(node);
    }
    for children in index.values_mut() {
        children.sort_by_key(|n| n.order);
    }
    index
}

// ---------------------------------------------------------------------------
// Depth
// ---------------------------------------------------------------------------

/// Number of ancestor hops from `id` to the root level. Root-level nodes are 0.
///
/// The walk is bounded by the tree size so malformed (cyclic) input still
/// terminates.
pub fn depth_of(tree: &Tree, id: &str) -> usize {
    let mut depth = 0;
    let mut current = tree.get(id);
    while let Some(node) = current {
        if depth >= tree.len() {
            break;
        }
        match node.parent().and_then(|p| tree.get(p)) {
            Some(parent) => {
                depth += 1;
                current = Some(parent);
            }
            None => break,
        }
    }
    depth
}

/// Height of the live subtree under `id`: 0 for a leaf or empty folder,
/// otherwise one more than the tallest child.
pub fn max_subtree_depth(tree: &Tree, id: &str) -> usize {
    let index = child_index(tree);
    subtree_height(&index, id, tree.len())
}

fn subtree_height(index: &HashMap<Option<&str>, Vec<&Node>>, id: &str, budget: usize) -> usize {
    if budget == 0 {
        return 0;
    }
    index
        .get(&Some(id))
        .and_then(|children| {
            children
                .iter()
                .map(|c| 1 + subtree_height(index, &c.id, budget - 1))
                .max()
        })
        .unwrap_or(0)
}

/// Folder levels below `id`: 0 when it holds no live subfolder, otherwise one
/// more than the tallest child folder. Tasks never add a level.
pub fn folder_subtree_depth(tree: &Tree, id: &str) -> usize {
    let index = child_index(tree);
    folder_height(&index, id, tree.len())
}

fn folder_height(index: &HashMap<Option<&str>, Vec<&Node>>, id: &str, budget: usize) -> usize {
    if budget == 0 {
        return 0;
    }
    index
        .get(&Some(id))
        .and_then(|children| {
            children
                .iter()
                .filter(|c| c.is_folder())
                .map(|c| 1 + folder_height(index, &c.id, budget - 1))
                .max()
        })
        .unwrap_or(0)
}

/// Whether a folder at `depth` carrying a subtree of `subtree_depth` levels
/// stays under `max_depth`. `max_depth` counts levels with the root level as
/// level 1, so the deepest admissible folder sits at depth `max_depth - 2`.
pub fn folder_fits(depth: usize, subtree_depth: usize, max_depth: usize) -> bool {
    depth + 1 + subtree_depth < max_depth
}

// ---------------------------------------------------------------------------
// Ancestry
// ---------------------------------------------------------------------------

/// Ancestors of `id`, nearest first. Deleted ancestors are included.
pub fn ancestors<'a>(tree: &'a Tree, id: &str) -> Vec<&'a Node> {
    let mut chain = Vec::new();
    let mut current = tree.get(id).and_then(|n| n.parent());
    while let Some(parent_id) = current {
        let Some(parent) = tree.get(parent_id) else {
            break;
        };
        if chain.len() >= tree.len() {
            break;
        }
        chain.push(parent);
        current = parent.parent();
    }
    chain
}

/// Whether `id` lies strictly below `ancestor_id`.
pub fn is_descendant(tree: &Tree, ancestor_id: &str, id: &str) -> bool {
    ancestors(tree, id).iter().any(|a| a.id == ancestor_id)
}

/// Every node below `id`, breadth-first, regardless of deletion state.
pub fn descendant_ids(tree: &Tree, id: &str) -> Vec<String> {
    let mut by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in tree.iter() {
        if let Some(parent) = node.parent() {
            by_parent.entry(parent).or_default().push(&node.id);
        }
    }

    let mut seen: HashSet<&str> = HashSet::from([id]);
    let mut out = Vec::new();
    let mut queue = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
        for &child in by_parent.get(current).map(Vec::as_slice).unwrap_or(&[]) {
            if seen.insert(child) {
                out.push(child.to_string());
                queue.push_back(child);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Outline views
// ---------------------------------------------------------------------------

/// The rows a renderer shows: live nodes in sibling order, descending only
/// into expanded folders.
pub fn visible_nodes(tree: &Tree) -> Vec<VisibleNode<'_>> {
    flatten(tree, false)
}

/// Like [`visible_nodes`] but ignores collapse state.
pub fn all_live_nodes(tree: &Tree) -> Vec<VisibleNode<'_>> {
    flatten(tree, true)
}

fn flatten(tree: &Tree, include_collapsed: bool) -> Vec<VisibleNode<'_>> {
    let index = child_index(tree);
    let mut out = Vec::new();
    let mut stack: Vec<(&Node, usize)> = index
        .get(&None)
        .map(|roots| roots.iter().rev().map(|n| (*n, 0)).collect())
        .unwrap_or_default();

    while let Some((node, depth)) = stack.pop() {
        if out.len() > tree.len() {
            break;
        }
        out.push(VisibleNode { node, depth });
        if node.is_folder()
            && (node.is_expanded || include_collapsed)
            && let Some(children) = index.get(&Some(node.id.as_str()))
        {
            for child in children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
    }
    out
}

/// Soft-deleted nodes, most recently deleted first.
pub fn deleted_nodes(tree: &Tree) -> Vec<&Node> {
    let mut deleted: Vec<&Node> = tree.iter().filter(|n| n.is_deleted).collect();
    deleted.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
    deleted
}

/// Next row to select when moving `direction` from `selected`.
///
/// With nothing selected, Down picks the first row and Up the last.
pub fn neighbor<'a>(
    visible: &[VisibleNode<'a>],
    selected: Option<&str>,
    direction: Direction,
) -> Option<&'a str> {
    let position = selected.and_then(|id| visible.iter().position(|v| v.node.id == id));
    let target = match (direction, selected, position) {
        (Direction::Down, _, Some(i)) => visible.get(i + 1),
        (Direction::Down, _, None) => visible.first(),
        (Direction::Up, _, Some(i)) => i.checked_sub(1).and_then(|j| visible.get(j)),
        (Direction::Up, None, None) => visible.last(),
        (Direction::Up, Some(_), None) => None,
    };
    target.map(|v| v.node.id.as_str())
}

// ---------------------------------------------------------------------------
// Indent / outdent targets
// ---------------------------------------------------------------------------

/// The folder `id` would move into when indented: the nearest live folder
/// sibling above it.
pub fn indent_target<'a>(tree: &'a Tree, id: &str) -> Option<&'a str> {
    let node = tree.get(id)?;
    let siblings = children_of(tree, node.parent());
    let idx = siblings.iter().position(|n| n.id == id)?;
    siblings[..idx]
        .iter()
        .rev()
        .find(|n| n.is_folder())
        .map(|n| n.id.as_str())
}

/// Where `id` goes when outdented, or `None` when it is already root-level.
pub fn outdent_target<'a>(tree: &'a Tree, id: &str) -> Option<OutdentTarget<'a>> {
    let parent_id = tree.get(id)?.parent()?;
    let parent = tree.get(parent_id)?;
    Some(match parent.parent() {
        Some(grandparent) => OutdentTarget::Folder(grandparent),
        None => OutdentTarget::Root,
    })
}

// ---------------------------------------------------------------------------
// Presentation helpers
// ---------------------------------------------------------------------------

/// Slash-joined titles of the folders above `id` (outermost first).
/// Root-level tasks report `Inbox`; unknown ids report an empty string.
pub fn folder_path(tree: &Tree, id: &str) -> String {
    let Some(node) = tree.get(id) else {
        return String::new();
    };
    let mut names: Vec<&str> = ancestors(tree, id)
        .into_iter()
        .filter(|a| a.is_folder())
        .map(|a| a.title.as_str())
        .collect();
    if names.is_empty() && node.is_task() {
        return "Inbox".to_string();
    }
    names.reverse();
    names.join("/")
}

/// Display colour of `id`: a folder's own colour, else the nearest coloured
/// ancestor folder, else the inbox colour for root-level tasks.
pub fn resolve_color<'a>(tree: &'a Tree, id: &str) -> Option<&'a str> {
    let node = tree.get(id)?;
    if node.is_folder()
        && let Some(color) = node.color.as_deref()
    {
        return Some(color);
    }
    for ancestor in ancestors(tree, id) {
        if ancestor.is_folder()
            && let Some(color) = ancestor.color.as_deref()
        {
            return Some(color);
        }
    }
    if node.is_task() && node.parent().is_none() {
        return Some(INBOX_COLOR);
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{folder, sample_tree, task};

    fn ids<'a>(nodes: &[&'a Node]) -> Vec<&'a str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn visible_ids<'a>(rows: &[VisibleNode<'a>]) -> Vec<&'a str> {
        rows.iter().map(|v| v.node.id.as_str()).collect()
    }

    #[test]
    fn children_sorted_and_live_only() {
        let mut tree = sample_tree();
        tree.get_mut("t2").unwrap().is_deleted = true;
        assert_eq!(ids(&children_of(&tree, Some("work"))), vec!["proj", "t1"]);
        assert_eq!(ids(&children_of(&tree, None)), vec!["work", "home", "inbox1"]);
    }

    #[test]
    fn depth_counts_hops() {
        let tree = sample_tree();
        assert_eq!(depth_of(&tree, "work"), 0);
        assert_eq!(depth_of(&tree, "proj"), 1);
        assert_eq!(depth_of(&tree, "p1"), 2);
        assert_eq!(depth_of(&tree, "missing"), 0);
    }

    #[test]
    fn subtree_depth() {
        let tree = sample_tree();
        assert_eq!(max_subtree_depth(&tree, "work"), 2);
        assert_eq!(max_subtree_depth(&tree, "proj"), 1);
        assert_eq!(max_subtree_depth(&tree, "home"), 0);
        assert_eq!(max_subtree_depth(&tree, "t1"), 0);
    }

    #[test]
    fn subtree_depth_ignores_deleted_children() {
        let mut tree = sample_tree();
        tree.get_mut("p1").unwrap().is_deleted = true;
        assert_eq!(max_subtree_depth(&tree, "work"), 1);
    }

    #[test]
    fn folder_subtree_depth_skips_tasks() {
        let tree = sample_tree();
        assert_eq!(folder_subtree_depth(&tree, "work"), 1);
        assert_eq!(folder_subtree_depth(&tree, "proj"), 0);
        assert_eq!(folder_subtree_depth(&tree, "p1"), 0);
    }

    #[test]
    fn depth_terminates_on_cycle() {
        let tree = Tree::from_nodes(vec![folder("a", Some("b"), 0), folder("b", Some("a"), 0)]);
        assert!(depth_of(&tree, "a") <= tree.len());
        assert!(ancestors(&tree, "a").len() <= tree.len());
    }

    #[test]
    fn folder_fits_counts_root_as_level_one() {
        // Four nested folders fit under a limit of five; a fifth does not.
        assert!(folder_fits(3, 0, 5));
        assert!(!folder_fits(4, 0, 5));
        assert!(folder_fits(0, 3, 5));
        assert!(!folder_fits(1, 3, 5));
    }

    #[test]
    fn descendants_breadth_first() {
        let tree = sample_tree();
        assert_eq!(descendant_ids(&tree, "work"), vec!["proj", "t1", "t2", "p1"]);
        assert!(descendant_ids(&tree, "t1").is_empty());
    }

    #[test]
    fn is_descendant_walks_up() {
        let tree = sample_tree();
        assert!(is_descendant(&tree, "work", "p1"));
        assert!(!is_descendant(&tree, "p1", "work"));
        assert!(!is_descendant(&tree, "work", "work"));
    }

    #[test]
    fn visible_skips_collapsed_folders() {
        let mut tree = sample_tree();
        assert_eq!(
            visible_ids(&visible_nodes(&tree)),
            vec!["work", "proj", "p1", "t1", "t2", "home", "inbox1"]
        );
        tree.get_mut("proj").unwrap().is_expanded = false;
        let rows = visible_nodes(&tree);
        assert_eq!(
            visible_ids(&rows),
            vec!["work", "proj", "t1", "t2", "home", "inbox1"]
        );
        assert_eq!(rows[1].depth, 1);
        assert_eq!(all_live_nodes(&tree).len(), 7);
    }

    #[test]
    fn deleted_listing_newest_first() {
        let mut tree = sample_tree();
        let now = chrono::Utc::now();
        for (id, secs) in [("t1", 10), ("t2", 20)] {
            let node = tree.get_mut(id).unwrap();
            node.is_deleted = true;
            node.deleted_at = Some(now + chrono::Duration::seconds(secs));
        }
        assert_eq!(ids(&deleted_nodes(&tree)), vec!["t2", "t1"]);
    }

    #[test]
    fn neighbor_navigation() {
        let tree = sample_tree();
        let rows = visible_nodes(&tree);
        assert_eq!(neighbor(&rows, None, Direction::Down), Some("work"));
        assert_eq!(neighbor(&rows, None, Direction::Up), Some("inbox1"));
        assert_eq!(neighbor(&rows, Some("work"), Direction::Down), Some("proj"));
        assert_eq!(neighbor(&rows, Some("work"), Direction::Up), None);
        assert_eq!(neighbor(&rows, Some("inbox1"), Direction::Down), None);
        assert_eq!(neighbor(&rows, Some("gone"), Direction::Down), Some("work"));
        assert_eq!(neighbor(&rows, Some("gone"), Direction::Up), None);
    }

    #[test]
    fn indent_picks_nearest_folder_above() {
        let tree = sample_tree();
        assert_eq!(indent_target(&tree, "t1"), Some("proj"));
        assert_eq!(indent_target(&tree, "inbox1"), Some("home"));
        assert_eq!(indent_target(&tree, "home"), Some("work"));
        assert_eq!(indent_target(&tree, "work"), None);
    }

    #[test]
    fn outdent_targets() {
        let tree = sample_tree();
        assert_eq!(outdent_target(&tree, "p1"), Some(OutdentTarget::Folder("work")));
        assert_eq!(outdent_target(&tree, "t1"), Some(OutdentTarget::Root));
        assert_eq!(outdent_target(&tree, "work"), None);
    }

    #[test]
    fn folder_path_and_inbox() {
        let tree = sample_tree();
        assert_eq!(folder_path(&tree, "p1"), "Work/Project");
        assert_eq!(folder_path(&tree, "inbox1"), "Inbox");
        assert_eq!(folder_path(&tree, "work"), "");
    }

    #[test]
    fn color_inherits_from_nearest_folder() {
        let mut tree = sample_tree();
        tree.get_mut("work").unwrap().color = Some("#111111".into());
        assert_eq!(resolve_color(&tree, "p1"), Some("#111111"));
        tree.get_mut("proj").unwrap().color = Some("#222222".into());
        assert_eq!(resolve_color(&tree, "p1"), Some("#222222"));
        assert_eq!(resolve_color(&tree, "inbox1"), Some(INBOX_COLOR));
        assert_eq!(resolve_color(&tree, "home"), None);
        let lone = Tree::from_nodes(vec![task("x", Some("nowhere"), 0)]);
        assert_eq!(resolve_color(&lone, "x"), None);
    }
}
