use std::fs;
use std::path::{Path, PathBuf};

use crate::io::config_io::{config_path, read_config, write_config};
use crate::io::mirror::StoreMirror;
use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::io::store::{JsonFileStore, NodeStore, StoreError};
use crate::model::config::ArborConfig;
use crate::model::tree::Tree;
use crate::ops::history::History;
use crate::outliner::Outliner;

/// Name of the per-workspace data directory
pub const ARBOR_DIR: &str = ".arbor";

const HISTORY_FILE: &str = "history.json";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not an arbor workspace: no .arbor/ directory found (run `arb init`)")]
    NotAWorkspace,
    #[error("workspace already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not serialize history: {0}")]
    HistoryError(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A located workspace and its configuration
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub arbor_dir: PathBuf,
    pub config: ArborConfig,
}

impl Workspace {
    pub fn store_path(&self) -> PathBuf {
        self.arbor_dir.join(&self.config.store.file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.arbor_dir.join(HISTORY_FILE)
    }
}

/// Walk up from `start` to the first directory holding `.arbor/config.toml`.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        if config_path(&current.join(ARBOR_DIR)).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

pub fn load_workspace(root: &Path) -> Result<Workspace, WorkspaceError> {
    let arbor_dir = root.join(ARBOR_DIR);
    if !arbor_dir.is_dir() {
        return Err(WorkspaceError::NotAWorkspace);
    }
    let config = read_config(&arbor_dir)?;
    Ok(Workspace {
        root: root.to_path_buf(),
        arbor_dir,
        config,
    })
}

/// Create `.arbor/` under `root` with a default config and an empty store.
pub fn init_workspace(root: &Path) -> Result<Workspace, WorkspaceError> {
    let arbor_dir = root.join(ARBOR_DIR);
    if config_path(&arbor_dir).exists() {
        return Err(WorkspaceError::AlreadyExists(arbor_dir));
    }
    fs::create_dir_all(&arbor_dir).map_err(|source| WorkspaceError::WriteError {
        path: arbor_dir.clone(),
        source,
    })?;
    let config = ArborConfig::default();
    write_config(&arbor_dir, &config)?;

    let workspace = Workspace {
        root: root.to_path_buf(),
        arbor_dir,
        config,
    };
    JsonFileStore::new(workspace.store_path()).replace_all(&[])?;
    Ok(workspace)
}

// ---------------------------------------------------------------------------
// History file
// ---------------------------------------------------------------------------

/// Read the saved undo/redo stacks. A missing file is a fresh history; an
/// unreadable one is journaled and replaced with a fresh history rather
/// than blocking the command.
pub fn read_history(workspace: &Workspace) -> History {
    let limit = workspace.config.history.limit;
    if !workspace.config.history.persist {
        return History::new(limit);
    }
    let path = workspace.history_path();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return History::new(limit),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read history");
            return History::new(limit);
        }
    };
    match serde_json::from_str::<History>(&text) {
        Ok(mut history) => {
            history.set_limit(limit);
            history
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "discarding unreadable history");
            log_recovery(
                &workspace.arbor_dir,
                RecoveryEntry::new(RecoveryCategory::Load, "unreadable history discarded")
                    .field("Error", e.to_string())
                    .body(text),
            );
            History::new(limit)
        }
    }
}

pub fn write_history(workspace: &Workspace, history: &History) -> Result<(), WorkspaceError> {
    if !workspace.config.history.persist {
        return Ok(());
    }
    let path = workspace.history_path();
    let json = serde_json::to_string(history)?;
    atomic_write(&path, json.as_bytes()).map_err(|source| WorkspaceError::WriteError { path, source })
}

// ---------------------------------------------------------------------------
// Outliner
// ---------------------------------------------------------------------------

/// Load the stored nodes and saved history into an outliner that mirrors
/// every change back to the workspace store.
pub fn open_outliner(workspace: &Workspace) -> Result<Outliner, WorkspaceError> {
    let mut store = JsonFileStore::new(workspace.store_path());
    let tree = Tree::from_nodes(store.load()?);
    tracing::debug!(nodes = tree.len(), root = %workspace.root.display(), "workspace loaded");

    let mut outliner = Outliner::new(tree, &workspace.config).with_history(read_history(workspace));
    outliner.attach_mirror(StoreMirror::spawn(store, Some(workspace.arbor_dir.clone())));
    Ok(outliner)
}

/// Wait for pending store writes and save the history stacks.
pub fn close_outliner(workspace: &Workspace, outliner: &Outliner) -> Result<(), WorkspaceError> {
    outliner.flush();
    write_history(workspace, outliner.history())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{NewNode, NodeKind};
    use tempfile::TempDir;

    #[test]
    fn init_and_discover() {
        let tmp = TempDir::new().unwrap();
        init_workspace(tmp.path()).unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_workspace(&nested).unwrap(), tmp.path());
        assert!(matches!(
            init_workspace(tmp.path()),
            Err(WorkspaceError::AlreadyExists(_))
        ));
    }

    #[test]
    fn discover_outside_workspace() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_workspace(tmp.path()),
            Err(WorkspaceError::NotAWorkspace)
        ));
    }

    #[test]
    fn changes_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let ws = init_workspace(tmp.path()).unwrap();

        let mut outliner = open_outliner(&ws).unwrap();
        let folder = outliner
            .create(NodeKind::Folder, None, "Work", NewNode::default())
            .unwrap();
        outliner
            .create(NodeKind::Task, Some(folder.id.as_str()), "Ship", NewNode::default())
            .unwrap();
        close_outliner(&ws, &outliner).unwrap();
        drop(outliner);

        let mut reopened = open_outliner(&ws).unwrap();
        assert_eq!(reopened.tree().len(), 2);
        assert_eq!(reopened.history().undo_len(), 2);
        reopened.undo().unwrap();
        assert_eq!(reopened.tree().len(), 1);
    }

    #[test]
    fn corrupt_history_is_journaled() {
        let tmp = TempDir::new().unwrap();
        let ws = init_workspace(tmp.path()).unwrap();
        fs::write(ws.history_path(), "{ nope").unwrap();
        let history = read_history(&ws);
        assert!(!history.can_undo());
        let entries = crate::io::recovery::read_recovery_entries(&ws.arbor_dir, None);
        assert_eq!(entries[0].category, RecoveryCategory::Load);
    }
}
