//! Applying a template (an exported list of nodes) under a folder.
//!
//! Template ids are only used to wire parents to children; every node gets
//! a fresh id from the outliner as it is created.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::model::node::{NewNode, NodeKind, NodePatch};
use crate::ops::TreeError;
use crate::outliner::Outliner;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no nodes found in template")]
    NoNodes,
    #[error("could not parse template: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cannot import here: {0}")]
    Target(TreeError),
}

/// One node as it appears in a template file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNode {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub work_duration_minutes: Option<u32>,
}

#[derive(Debug, Default)]
pub struct ImportResult {
    /// `(template id, new id)` in creation order
    pub created: Vec<(String, String)>,
    /// Template nodes that were not created, with the reason
    pub skipped: Vec<(String, String)>,
}

pub fn parse_template(json: &str) -> Result<Vec<TemplateNode>, ImportError> {
    Ok(serde_json::from_str(json)?)
}

/// Create every template node under `parent` (root when `None`).
///
/// Parents are created before their children. A node whose parent is not in
/// the template attaches to `parent`. When a create is refused (depth, for
/// instance) that node and everything below it is skipped and reported.
pub fn apply_template(
    outliner: &mut Outliner,
    nodes: Vec<TemplateNode>,
    parent: Option<&str>,
) -> Result<ImportResult, ImportError> {
    if nodes.is_empty() {
        return Err(ImportError::NoNodes);
    }
    if let Some(parent_id) = parent {
        match outliner.node(parent_id) {
            None => return Err(ImportError::Target(TreeError::NotFound(parent_id.into()))),
            Some(n) if n.is_deleted => {
                return Err(ImportError::Target(TreeError::Deleted(parent_id.into())));
            }
            Some(n) if !n.is_folder() => {
                return Err(ImportError::Target(TreeError::NotAFolder(parent_id.into())));
            }
            Some(_) => {}
        }
    }

    let mut result = ImportResult::default();
    let mut new_ids: HashMap<String, String> = HashMap::new();
    let mut dropped: HashSet<String> = HashSet::new();

    for node in parent_first(nodes, &mut result) {
        let template_parent = node
            .parent_id
            .as_ref()
            .filter(|p| new_ids.contains_key(*p) || dropped.contains(*p));
        if let Some(p) = template_parent
            && dropped.contains(p)
        {
            result
                .skipped
                .push((node.id.clone(), format!("parent {} was skipped", p)));
            dropped.insert(node.id);
            continue;
        }
        let target = match template_parent {
            Some(p) => new_ids.get(p).map(String::as_str),
            None => parent,
        };

        let created = match outliner.create(node.kind, target, &node.title, NewNode::default()) {
            Ok(created) => created,
            Err(e) => {
                result.skipped.push((node.id.clone(), e.to_string()));
                dropped.insert(node.id);
                continue;
            }
        };

        let patch = NodePatch {
            content: node.content.clone().map(Some),
            color: node.color.clone().map(Some),
            work_duration_minutes: node.work_duration_minutes.map(Some),
            ..Default::default()
        };
        if !patch.is_empty()
            && let Err(e) = outliner.update(&created.id, &patch)
        {
            tracing::warn!(id = %created.id, error = %e, "could not apply template fields");
        }

        result.created.push((node.id.clone(), created.id.clone()));
        new_ids.insert(node.id, created.id);
    }

    tracing::debug!(
        created = result.created.len(),
        skipped = result.skipped.len(),
        "template applied"
    );
    Ok(result)
}

/// Order template nodes so each comes after its parent, keeping file order
/// otherwise. Nodes caught in a parent cycle are reported as skipped.
fn parent_first(nodes: Vec<TemplateNode>, result: &mut ImportResult) -> Vec<TemplateNode> {
    let known: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut pending = nodes;
    let mut ordered = Vec::with_capacity(pending.len());

    loop {
        let before = pending.len();
        let mut waiting = Vec::new();
        for node in pending {
            let ready = match &node.parent_id {
                Some(p) => !known.contains(p) || placed.contains(p),
                None => true,
            };
            if ready {
                placed.insert(node.id.clone());
                ordered.push(node);
            } else {
                waiting.push(node);
            }
        }
        pending = waiting;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for node in pending {
        result
            .skipped
            .push((node.id, "parent cycle in template".to_string()));
    }
    ordered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
