//! Tree builders shared by the ops unit tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::model::node::{Node, NodeKind};
use crate::model::tree::Tree;

/// Every builder stamps this instead of the clock, so two trees built the
/// same way compare equal.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

fn stamped(mut node: Node, order: usize) -> Node {
    node.order = order;
    node.created_at = fixed_now();
    if node.scheduled_at.is_some() {
        node.scheduled_at = Some(fixed_now());
    }
    node
}

pub(crate) fn folder(id: &str, parent: Option<&str>, order: usize) -> Node {
    let node = Node::new(
        id.to_string(),
        NodeKind::Folder,
        id.to_string(),
        parent.map(String::from),
    );
    stamped(node, order)
}

pub(crate) fn task(id: &str, parent: Option<&str>, order: usize) -> Node {
    let node = Node::new(
        id.to_string(),
        NodeKind::Task,
        id.to_string(),
        parent.map(String::from),
    );
    stamped(node, order)
}

/// ```text
/// Work/          (work)
///   Project/     (proj)
///     p1
///   t1
///   t2
/// Home/          (home)
/// inbox1
/// ```
pub(crate) fn sample_tree() -> Tree {
    let mut work = folder("work", None, 0);
    work.title = "Work".into();
    let mut proj = folder("proj", Some("work"), 0);
    proj.title = "Project".into();
    let mut home = folder("home", None, 1);
    home.title = "Home".into();
    Tree::from_nodes(vec![
        work,
        proj,
        task("p1", Some("proj"), 0),
        task("t1", Some("work"), 1),
        task("t2", Some("work"), 2),
        home,
        task("inbox1", None, 2),
    ])
}

/// Ids of the live children of `parent`, in order.
pub(crate) fn child_ids(tree: &Tree, parent: Option<&str>) -> Vec<String> {
    crate::ops::query::children_of(tree, parent)
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
}

/// `(id, order)` pairs of the live children of `parent`.
pub(crate) fn orders(tree: &Tree, parent: Option<&str>) -> Vec<(String, usize)> {
    crate::ops::query::children_of(tree, parent)
        .into_iter()
        .map(|n| (n.id.clone(), n.order))
        .collect()
}
