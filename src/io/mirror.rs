//! Fire-and-forget mirroring of committed trees into a [`NodeStore`].
//!
//! Writes run on one background thread in the order they were queued. The
//! caller never waits unless it asks to with [`StoreMirror::flush`]. A failed
//! write is logged and journaled to the recovery log, then dropped; the
//! in-memory tree stays authoritative.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, log_recovery};
use crate::io::store::{NodeStore, StoreError};
use crate::model::node::Node;

enum MirrorJob {
    Upsert(Vec<Node>),
    Delete(Vec<String>),
    ReplaceAll(Vec<Node>),
    Flush(Sender<()>),
}

pub struct StoreMirror {
    tx: Option<Sender<MirrorJob>>,
    worker: Option<JoinHandle<()>>,
}

impl StoreMirror {
    /// Start the writer thread. Failed writes are journaled under
    /// `recovery_dir` when one is given.
    pub fn spawn<S>(store: S, recovery_dir: Option<PathBuf>) -> Self
    where
        S: NodeStore + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("arbor-mirror".into())
            .spawn(move || run_worker(store, rx, recovery_dir));
        match worker {
            Ok(handle) => StoreMirror {
                tx: Some(tx),
                worker: Some(handle),
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not start store mirror; changes stay in memory");
                StoreMirror {
                    tx: None,
                    worker: None,
                }
            }
        }
    }

    pub fn upsert(&self, nodes: Vec<Node>) {
        if !nodes.is_empty() {
            self.send(MirrorJob::Upsert(nodes));
        }
    }

    pub fn delete(&self, ids: Vec<String>) {
        if !ids.is_empty() {
            self.send(MirrorJob::Delete(ids));
        }
    }

    pub fn replace_all(&self, nodes: Vec<Node>) {
        self.send(MirrorJob::ReplaceAll(nodes));
    }

    /// Block until every job queued so far has been attempted.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(MirrorJob::Flush(ack_tx));
        // A closed channel means the worker is gone; nothing left to wait for.
        let _ = ack_rx.recv();
    }

    fn send(&self, job: MirrorJob) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(job).is_err() {
            tracing::warn!("store mirror has stopped; change not persisted");
        }
    }
}

impl Drop for StoreMirror {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!("store mirror thread panicked");
        }
    }
}

fn run_worker<S: NodeStore>(mut store: S, rx: Receiver<MirrorJob>, recovery_dir: Option<PathBuf>) {
    for job in rx {
        let (what, result, rows) = match job {
            MirrorJob::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
            MirrorJob::Upsert(nodes) => ("upsert", store.upsert(&nodes), Rows::Nodes(nodes)),
            MirrorJob::Delete(ids) => ("delete", store.delete(&ids), Rows::Ids(ids)),
            MirrorJob::ReplaceAll(nodes) => {
                ("replace_all", store.replace_all(&nodes), Rows::Nodes(nodes))
            }
        };
        match result {
            Ok(()) => tracing::trace!(op = what, rows = rows.len(), "mirrored"),
            Err(e) => report_failure(what, &e, &rows, recovery_dir.as_deref()),
        }
    }
}

enum Rows {
    Nodes(Vec<Node>),
    Ids(Vec<String>),
}

impl Rows {
    fn len(&self) -> usize {
        match self {
            Rows::Nodes(nodes) => nodes.len(),
            Rows::Ids(ids) => ids.len(),
        }
    }

    fn to_json(&self) -> String {
        let encoded = match self {
            Rows::Nodes(nodes) => serde_json::to_string_pretty(nodes),
            Rows::Ids(ids) => serde_json::to_string_pretty(ids),
        };
        encoded.unwrap_or_else(|e| format!("<could not serialize rows: {}>", e))
    }
}

fn report_failure(
    what: &str,
    error: &StoreError,
    rows: &Rows,
    recovery_dir: Option<&std::path::Path>,
) {
    tracing::warn!(op = what, rows = rows.len(), error = %error, "store write failed");
    if let Some(dir) = recovery_dir {
        log_recovery(
            dir,
            RecoveryEntry::new(RecoveryCategory::Write, format!("{} failed", what))
                .field("Error", error.to_string())
                .field("Rows", rows.len().to_string())
                .body(rows.to_json()),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::read_recovery_entries;
    use crate::io::store::MemoryStore;
    use crate::model::node::NodeKind;
    use tempfile::TempDir;

    fn node(id: &str) -> Node {
        Node::new(id.into(), NodeKind::Task, id.into(), None)
    }

    #[test]
    fn jobs_apply_in_order() {
        let store = MemoryStore::new();
        let mirror = StoreMirror::spawn(store.clone(), None);
        mirror.replace_all(vec![node("a"), node("b")]);
        mirror.delete(vec!["a".into()]);
        mirror.upsert(vec![node("c")]);
        mirror.flush();
        let ids: Vec<String> = store.snapshot().keys().cloned().collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn drop_drains_queue() {
        let store = MemoryStore::new();
        {
            let mirror = StoreMirror::spawn(store.clone(), None);
            mirror.upsert(vec![node("a")]);
        }
        assert!(store.snapshot().contains_key("a"));
    }

    #[test]
    fn failures_go_to_recovery_log() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.set_failing(true);
        let mirror = StoreMirror::spawn(store.clone(), Some(tmp.path().to_path_buf()));
        mirror.replace_all(vec![node("lost")]);
        mirror.flush();

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert!(entries[0].body.contains("\"lost\""));
    }
}
