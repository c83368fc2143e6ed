//! The persistence backend the outliner mirrors into.
//!
//! Stores are row-oriented: one record per node, keyed by id, always written
//! with the node's full field set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::io::recovery::atomic_write;
use crate::model::node::Node;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed store file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize nodes: {0}")]
    Serialize(serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait NodeStore {
    /// Every stored row, in storage order.
    fn load(&mut self) -> Result<Vec<Node>, StoreError>;
    /// Insert or overwrite rows by id.
    fn upsert(&mut self, nodes: &[Node]) -> Result<(), StoreError>;
    /// Remove rows by id. Unknown ids are ignored.
    fn delete(&mut self, ids: &[String]) -> Result<(), StoreError>;
    /// Make the stored rows exactly `nodes`.
    fn replace_all(&mut self, nodes: &[Node]) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// All rows in one pretty-printed JSON array, rewritten atomically on every
/// change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: Option<IndexMap<String, Node>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            rows: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self) -> Result<IndexMap<String, Node>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        let nodes: Vec<Node> =
            serde_json::from_str(&text).map_err(|source| StoreError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        Ok(nodes.into_iter().map(|n| (n.id.clone(), n)).collect())
    }

    fn rows_mut(&mut self) -> Result<&mut IndexMap<String, Node>, StoreError> {
        if self.rows.is_none() {
            self.rows = Some(self.read_rows()?);
        }
        self.rows
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("rows not loaded".into()))
    }

    fn write_rows(&self, rows: &IndexMap<String, Node>) -> Result<(), StoreError> {
        let nodes: Vec<&Node> = rows.values().collect();
        let mut json = serde_json::to_string_pretty(&nodes).map_err(StoreError::Serialize)?;
        json.push('\n');
        atomic_write(&self.path, json.as_bytes()).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn commit(&mut self, rows: IndexMap<String, Node>) -> Result<(), StoreError> {
        self.write_rows(&rows)?;
        self.rows = Some(rows);
        Ok(())
    }
}

impl NodeStore for JsonFileStore {
    fn load(&mut self) -> Result<Vec<Node>, StoreError> {
        let rows = self.read_rows()?;
        let nodes = rows.values().cloned().collect();
        self.rows = Some(rows);
        Ok(nodes)
    }

    fn upsert(&mut self, nodes: &[Node]) -> Result<(), StoreError> {
        let mut rows = self.rows_mut()?.clone();
        for node in nodes {
            rows.insert(node.id.clone(), node.clone());
        }
        self.commit(rows)
    }

    fn delete(&mut self, ids: &[String]) -> Result<(), StoreError> {
        let mut rows = self.rows_mut()?.clone();
        for id in ids {
            rows.shift_remove(id);
        }
        self.commit(rows)
    }

    fn replace_all(&mut self, nodes: &[Node]) -> Result<(), StoreError> {
        let rows = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
        self.commit(rows)
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// A store held in memory. Clones share the same rows, so a test can keep a
/// handle while the mirror owns another. `set_failing` makes every write
/// fail without touching the rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<IndexMap<String, Node>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let store = MemoryStore::new();
        if let Ok(mut rows) = store.rows.lock() {
            rows.extend(nodes.into_iter().map(|n| (n.id.clone(), n)));
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of the current rows.
    pub fn snapshot(&self) -> IndexMap<String, Node> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    fn write<T>(&self, f: impl FnOnce(&mut IndexMap<String, Node>) -> T) -> Result<T, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        Ok(f(&mut *rows))
    }
}

impl NodeStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<Node>, StoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        Ok(rows.values().cloned().collect())
    }

    fn upsert(&mut self, nodes: &[Node]) -> Result<(), StoreError> {
        self.write(|rows| {
            for node in nodes {
                rows.insert(node.id.clone(), node.clone());
            }
        })
    }

    fn delete(&mut self, ids: &[String]) -> Result<(), StoreError> {
        self.write(|rows| {
            for id in ids {
                rows.shift_remove(id);
            }
        })
    }

    fn replace_all(&mut self, nodes: &[Node]) -> Result<(), StoreError> {
        self.write(|rows| {
            *rows = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;
    use tempfile::TempDir;

    fn node(id: &str) -> Node {
        Node::new(id.into(), NodeKind::Task, id.into(), None)
    }

    #[test]
    fn json_store_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(tmp.path().join("nodes.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn json_store_upsert_delete_replace() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nodes.json");
        let mut store = JsonFileStore::new(&path);
        store.upsert(&[node("a"), node("b")]).unwrap();
        let mut renamed = node("a");
        renamed.title = "A".into();
        store.upsert(&[renamed]).unwrap();
        store.delete(&["b".to_string()]).unwrap();

        let mut reopened = JsonFileStore::new(&path);
        let rows = reopened.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "A");

        reopened.replace_all(&[node("c")]).unwrap();
        let ids: Vec<String> = JsonFileStore::new(&path)
            .load()
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn json_store_reports_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nodes.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn memory_store_shares_rows_between_clones() {
        let store = MemoryStore::new();
        let mut handle = store.clone();
        handle.upsert(&[node("a")]).unwrap();
        assert!(store.snapshot().contains_key("a"));

        store.set_failing(true);
        assert!(handle.delete(&["a".to_string()]).is_err());
        assert!(store.snapshot().contains_key("a"));
    }
}
