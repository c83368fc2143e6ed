pub mod check;
pub mod delete_ops;
pub mod history;
pub mod import;
pub mod move_ops;
pub mod node_ops;
pub mod query;
mod siblings;

#[cfg(test)]
pub(crate) mod test_support;

/// Why a tree operation was refused.
///
/// Every variant is raised before the working tree is touched, so an `Err`
/// always means "nothing changed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("node is deleted: {0}")]
    Deleted(String),
    #[error("not a folder: {0}")]
    NotAFolder(String),
    #[error("not a task: {0}")]
    NotATask(String),
    #[error("cannot move {node} into its own subtree ({target})")]
    Cycle { node: String, target: String },
    #[error("maximum folder depth ({max}) reached")]
    DepthExceeded { max: usize },
    #[error("folders and tasks cannot be interleaved ({node} next to {over})")]
    ZoneMismatch { node: String, over: String },
    #[error("{0} is already there")]
    AlreadyInPlace(String),
    #[error("no folder above {0} to indent into")]
    NoIndentTarget(String),
    #[error("node is already deleted: {0}")]
    AlreadyDeleted(String),
    #[error("node is not deleted: {0}")]
    NotDeleted(String),
    #[error("nothing to change on {0}")]
    NothingToChange(String),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

impl TreeError {
    /// Lookup failures, as opposed to refused gestures on nodes that exist.
    pub fn is_lookup(&self) -> bool {
        matches!(self, TreeError::NotFound(_))
    }
}
