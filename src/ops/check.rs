use std::collections::HashSet;

use serde::Serialize;

use crate::model::node::NodeKind;
use crate::model::tree::Tree;
use crate::ops::query::{children_of, depth_of, folder_fits, max_subtree_depth};

/// Structured result from `arb check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// `parentId` names a node that does not exist
    #[serde(rename = "missing_parent")]
    MissingParent { node_id: String, parent_id: String },
    /// `parentId` names a task
    #[serde(rename = "parent_is_task")]
    ParentIsTask { node_id: String, parent_id: String },
    /// Walking up from the node never reaches the root
    #[serde(rename = "cycle")]
    Cycle { node_id: String },
    /// A task is ordered before a folder in the same group
    #[serde(rename = "zone_violation")]
    ZoneViolation {
        parent_id: Option<String>,
        folder_id: String,
        task_id: String,
    },
    /// Sibling orders are not exactly `0..n`
    #[serde(rename = "non_dense_order")]
    NonDenseOrder {
        parent_id: Option<String>,
        orders: Vec<usize>,
    },
    /// A live folder sits at or past the nesting limit
    #[serde(rename = "depth_exceeded")]
    DepthExceeded { folder_id: String, depth: usize },
    /// A live folder's depth plus the height of everything under it, tasks
    /// included, reaches the limit
    #[serde(rename = "subtree_too_deep")]
    SubtreeTooDeep {
        folder_id: String,
        depth: usize,
        subtree_depth: usize,
    },
    /// A live node under a deleted parent
    #[serde(rename = "live_under_deleted")]
    LiveUnderDeleted { node_id: String, parent_id: String },
}

/// Something odd that does not break the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Task has no status at all
    #[serde(rename = "missing_status")]
    MissingStatus { node_id: String },
    /// Done task has no completion stamp
    #[serde(rename = "missing_completed_at")]
    MissingCompletedAt { node_id: String },
    /// Deleted node has no deletion stamp, so restore cannot tell its batch
    #[serde(rename = "missing_deleted_at")]
    MissingDeletedAt { node_id: String },
}

/// Validate every structural invariant of `tree`. Read-only.
pub fn check_tree(tree: &Tree, max_depth: usize) -> CheckResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for node in tree.iter() {
        if let Some(parent_id) = node.parent() {
            match tree.get(parent_id) {
                None => errors.push(CheckError::MissingParent {
                    node_id: node.id.clone(),
                    parent_id: parent_id.to_string(),
                }),
                Some(parent) if parent.kind == NodeKind::Task => {
                    errors.push(CheckError::ParentIsTask {
                        node_id: node.id.clone(),
                        parent_id: parent_id.to_string(),
                    })
                }
                Some(parent) if parent.is_deleted && !node.is_deleted => {
                    errors.push(CheckError::LiveUnderDeleted {
                        node_id: node.id.clone(),
                        parent_id: parent_id.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        if has_cycle(tree, &node.id) {
            errors.push(CheckError::Cycle {
                node_id: node.id.clone(),
            });
        }

        if node.is_task() && node.status.is_none() {
            warnings.push(CheckWarning::MissingStatus {
                node_id: node.id.clone(),
            });
        }
        if node.is_done() && node.completed_at.is_none() {
            warnings.push(CheckWarning::MissingCompletedAt {
                node_id: node.id.clone(),
            });
        }
        if node.is_deleted && node.deleted_at.is_none() {
            warnings.push(CheckWarning::MissingDeletedAt {
                node_id: node.id.clone(),
            });
        }
    }

    // Depth is only meaningful once the parent chains are sound.
    if errors.is_empty() {
        for node in tree.iter().filter(|n| n.is_folder() && !n.is_deleted) {
            let depth = depth_of(tree, &node.id);
            if !folder_fits(depth, 0, max_depth) {
                errors.push(CheckError::DepthExceeded {
                    folder_id: node.id.clone(),
                    depth,
                });
            }
            let subtree_depth = max_subtree_depth(tree, &node.id);
            if depth + subtree_depth >= max_depth {
                errors.push(CheckError::SubtreeTooDeep {
                    folder_id: node.id.clone(),
                    depth,
                    subtree_depth,
                });
            }
        }
    }

    let mut parents: Vec<Option<&str>> = Vec::new();
    let mut seen: HashSet<Option<&str>> = HashSet::new();
    for node in tree.iter().filter(|n| !n.is_deleted) {
        if seen.insert(node.parent()) {
            parents.push(node.parent());
        }
    }
    for parent in parents {
        check_group(tree, parent, &mut errors);
    }

    CheckResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_group(tree: &Tree, parent: Option<&str>, errors: &mut Vec<CheckError>) {
    let group = children_of(tree, parent);

    let orders: Vec<usize> = group.iter().map(|n| n.order).collect();
    if orders.iter().enumerate().any(|(i, o)| i != *o) {
        errors.push(CheckError::NonDenseOrder {
            parent_id: parent.map(String::from),
            orders,
        });
    }

    let mut first_task: Option<&str> = None;
    for node in &group {
        match (node.kind, first_task) {
            (NodeKind::Task, None) => first_task = Some(&node.id),
            (NodeKind::Folder, Some(task_id)) => {
                errors.push(CheckError::ZoneViolation {
                    parent_id: parent.map(String::from),
                    folder_id: node.id.clone(),
                    task_id: task_id.to_string(),
                });
            }
            _ => {}
        }
    }
}

fn has_cycle(tree: &Tree, id: &str) -> bool {
    let mut current = tree.get(id).and_then(|n| n.parent());
    let mut hops = 0;
    while let Some(parent_id) = current {
        if parent_id == id || hops > tree.len() {
            return true;
        }
        hops += 1;
        current = tree.get(parent_id).and_then(|n| n.parent());
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
