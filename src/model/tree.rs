use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::node::{Node, NodeKind};

/// The flat node collection.
///
/// Every node lives in one id-keyed map; parent/child structure is derived
/// from `parent_id` lookups. Cloning a `Tree` is how history snapshots are
/// taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    nodes: IndexMap<String, Node>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Build a tree from stored rows. Later duplicates of an id win.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Tree {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node, keeping the iteration order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.nodes.shift_remove(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|k| k.as_str())
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }
}

/// Hands out node ids of the form `{kind}-{n}`.
///
/// Owned by the outliner rather than kept in a global, so tests can seed it
/// and two outliners never share a counter.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    counter: u64,
}

impl IdGenerator {
    /// Start counting after `seed`
    pub fn new(seed: u64) -> Self {
        IdGenerator { counter: seed }
    }

    /// Seed from the wall clock (milliseconds)
    pub fn from_clock() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        IdGenerator::new(millis)
    }

    /// Seed past both the clock and every numeric id suffix already in `tree`.
    pub fn after(tree: &Tree) -> Self {
        let highest = tree
            .ids()
            .filter_map(|id| id.rsplit('-').next()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let clock = IdGenerator::from_clock().counter;
        IdGenerator::new(highest.max(clock))
    }

    /// Next id for `kind` that is not already present in `tree`.
    pub fn next_id(&mut self, kind: NodeKind, tree: &Tree) -> String {
        loop {
            self.counter += 1;
            let id = format!("{}-{}", kind, self.counter);
            if !tree.contains(&id) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::from_clock()
    }
}
