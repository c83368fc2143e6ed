use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Background colours handed to new folders in rotation
pub const FOLDER_COLORS: [&str; 10] = [
    "#E8D5F5", // lavender
    "#D5E8F5", // sky blue
    "#D5F5E8", // mint
    "#F5E8D5", // peach
    "#F5D5E8", // pink
    "#E8F5D5", // lime
    "#F5F0D5", // yellow
    "#D5F5F0", // teal
    "#F5D5D5", // rose
    "#D5D5F5", // periwinkle
];

/// Colour of root-level tasks, which have no folder to inherit from
pub const INBOX_COLOR: &str = "#D5E8F5";

pub fn folder_color_by_index(index: usize) -> &'static str {
    FOLDER_COLORS[index % FOLDER_COLORS.len()]
}

/// Whether a node is a container or a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Task,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Task => "task",
        }
    }

    pub fn parse_kind(s: &str) -> Option<NodeKind> {
        match s {
            "folder" => Some(NodeKind::Folder),
            "task" => Some(NodeKind::Task),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl TaskStatus {
    pub fn checkbox_char(self) -> char {
        match self {
            TaskStatus::Todo => ' ',
            TaskStatus::Done => 'x',
        }
    }

    pub fn toggled(self) -> TaskStatus {
        match self {
            TaskStatus::Todo => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

/// A folder or task in the outline.
///
/// Parent links are ids resolved against the owning [`Tree`](super::Tree);
/// a node never holds another node directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub order: usize,
    /// Only meaningful for folders
    #[serde(default)]
    pub is_expanded: bool,
    /// Only set for tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Node {
    /// A fresh node with the defaults for its kind: tasks start `TODO`,
    /// folders start expanded.
    pub fn new(id: String, kind: NodeKind, title: String, parent_id: Option<String>) -> Self {
        let now = Utc::now();
        Node {
            id,
            kind,
            title,
            parent_id,
            order: 0,
            is_expanded: kind == NodeKind::Folder,
            status: (kind == NodeKind::Task).then_some(TaskStatus::Todo),
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            completed_at: None,
            scheduled_at: (kind == NodeKind::Task).then_some(now),
            content: None,
            work_duration_minutes: None,
            color: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_task(&self) -> bool {
        self.kind == NodeKind::Task
    }

    pub fn is_done(&self) -> bool {
        self.status == Some(TaskStatus::Done)
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Field changes accepted by `update`.
///
/// Structural fields (`parentId`, `order`, `kind`, deletion markers) are not
/// here: those only change through the move and delete ops.
/// Doubly-optional fields clear the value with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration_minutes: Option<Option<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }

    /// Shallow-merge the set fields into `node`.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        if let Some(content) = &self.content {
            node.content = content.clone();
        }
        if let Some(color) = &self.color {
            node.color = color.clone();
        }
        if let Some(scheduled_at) = self.scheduled_at {
            node.scheduled_at = scheduled_at;
        }
        if let Some(minutes) = self.work_duration_minutes {
            node.work_duration_minutes = minutes;
        }
        if let Some(status) = self.status
            && node.is_task()
        {
            node.status = Some(status);
        }
        if let Some(completed_at) = self.completed_at {
            node.completed_at = completed_at;
        }
        if let Some(expanded) = self.is_expanded
            && node.is_folder()
        {
            node.is_expanded = expanded;
        }
    }
}

/// Optional attributes for a node being created
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub content: Option<String>,
    /// Overrides the default `scheduledAt = now` for tasks
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Overrides the palette colour picked for new folders
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_defaults() {
        let node = Node::new("task-1".into(), NodeKind::Task, "Write".into(), None);
        assert_eq!(node.status, Some(TaskStatus::Todo));
        assert!(node.scheduled_at.is_some());
        assert!(!node.is_expanded);
        assert!(!node.is_deleted);
    }

    #[test]
    fn new_folder_defaults() {
        let node = Node::new("folder-1".into(), NodeKind::Folder, "Work".into(), None);
        assert_eq!(node.status, None);
        assert!(node.is_expanded);
        assert!(node.scheduled_at.is_none());
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let mut node = Node::new("task-1".into(), NodeKind::Task, "Old".into(), None);
        node.color = Some("#fff".into());
        let patch = NodePatch {
            title: Some("New".into()),
            content: Some(Some("body".into())),
            ..Default::default()
        };
        patch.apply_to(&mut node);
        assert_eq!(node.title, "New");
        assert_eq!(node.content.as_deref(), Some("body"));
        assert_eq!(node.color.as_deref(), Some("#fff"));
    }

    #[test]
    fn patch_clears_with_nested_none() {
        let mut node = Node::new("task-1".into(), NodeKind::Task, "T".into(), None);
        node.color = Some("#fff".into());
        NodePatch {
            color: Some(None),
            ..Default::default()
        }
        .apply_to(&mut node);
        assert_eq!(node.color, None);
    }

    #[test]
    fn patch_ignores_status_on_folder() {
        let mut node = Node::new("folder-1".into(), NodeKind::Folder, "F".into(), None);
        NodePatch {
            status: Some(TaskStatus::Done),
            ..Default::default()
        }
        .apply_to(&mut node);
        assert_eq!(node.status, None);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let node = Node::new(
            "task-1".into(),
            NodeKind::Task,
            "T".into(),
            Some("folder-1".into()),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["parentId"], "folder-1");
        assert_eq!(json["kind"], "task");
        assert_eq!(json["status"], "TODO");
        assert_eq!(json["isDeleted"], false);
        assert!(json.get("deletedAt").is_none());
    }
}
