use serde::Serialize;

use crate::model::node::{Node, NodeKind, TaskStatus};
use crate::model::tree::Tree;
use crate::ops::query::{VisibleNode, folder_path, resolve_color};
use crate::util::unicode::{pad_to_width, truncate_to_width};

/// Titles longer than this are cut in listings
const TITLE_WIDTH: usize = 48;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// A listing row: the stored node plus where it sits in the outline.
#[derive(Serialize)]
pub struct RowJson<'a> {
    pub depth: usize,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_color: Option<&'a str>,
    #[serde(flatten)]
    pub node: &'a Node,
}

#[derive(Serialize)]
pub struct ChangeJson<'a> {
    pub applied: bool,
    pub op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

pub fn row_to_json<'a>(tree: &'a Tree, row: &VisibleNode<'a>) -> RowJson<'a> {
    RowJson {
        depth: row.depth,
        path: folder_path(tree, &row.node.id),
        display_color: resolve_color(tree, &row.node.id),
        node: row.node,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn marker(node: &Node) -> String {
    match node.kind {
        NodeKind::Folder if node.is_expanded => "▾".to_string(),
        NodeKind::Folder => "▸".to_string(),
        NodeKind::Task => format!(
            "[{}]",
            node.status.unwrap_or(TaskStatus::Todo).checkbox_char()
        ),
    }
}

/// One outline row: indent, expand arrow or checkbox, title, id.
pub fn format_row(node: &Node, depth: usize) -> String {
    let title = if node.is_folder() {
        format!("{}/", node.title)
    } else {
        node.title.clone()
    };
    format!(
        "{}{} {}  ({})",
        "  ".repeat(depth),
        marker(node),
        truncate_to_width(&title, TITLE_WIDTH),
        node.id
    )
}

pub fn format_listing(rows: &[VisibleNode<'_>]) -> Vec<String> {
    rows.iter().map(|r| format_row(r.node, r.depth)).collect()
}

/// Trash rows, aligned on the id column.
pub fn format_trash(tree: &Tree, nodes: &[&Node]) -> Vec<String> {
    let id_width = nodes.iter().map(|n| n.id.len()).max().unwrap_or(0);
    nodes
        .iter()
        .map(|n| {
            let when = n
                .deleted_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".repeat(16));
            let path = folder_path(tree, &n.id);
            let location = if path.is_empty() {
                String::new()
            } else {
                format!("  in {}", path)
            };
            format!(
                "{}  {}  {}{}",
                when,
                pad_to_width(&n.id, id_width),
                truncate_to_width(&n.title, TITLE_WIDTH),
                location
            )
        })
        .collect()
}

/// Every field of one node, for `arb show`.
pub fn format_node_detail(tree: &Tree, node: &Node) -> Vec<String> {
    let mut lines = vec![format!("{} {}", marker(node), node.title)];
    lines.push(format!("id: {}", node.id));
    lines.push(format!("kind: {}", node.kind));
    let path = folder_path(tree, &node.id);
    if !path.is_empty() {
        lines.push(format!("path: {}", path));
    }
    lines.push(format!("order: {}", node.order));
    if let Some(color) = resolve_color(tree, &node.id) {
        lines.push(format!("color: {}", color));
    }
    lines.push(format!("created: {}", node.created_at.to_rfc3339()));
    if let Some(t) = node.scheduled_at {
        lines.push(format!("scheduled: {}", t.to_rfc3339()));
    }
    if let Some(t) = node.completed_at {
        lines.push(format!("completed: {}", t.to_rfc3339()));
    }
    if let Some(minutes) = node.work_duration_minutes {
        lines.push(format!("worked: {}m", minutes));
    }
    if let Some(t) = node.deleted_at {
        lines.push(format!("deleted: {}", t.to_rfc3339()));
    }
    if let Some(content) = &node.content {
        lines.push(String::new());
        lines.extend(content.lines().map(String::from));
    }
    lines
}
