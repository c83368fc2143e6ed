//! Append-only journal of data that could not be saved normally.
//!
//! Failed store writes land here with the node rows that were being written,
//! so nothing the user did is lost even when the mirror gives up.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

/// Size past which the oldest entries are dropped on the next append (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default age after which `arb recovery prune` drops entries.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- arbor recovery log: rows that could not be written to the store.
     View with: arb recovery
     Prune old entries: arb recovery prune -->

---
";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A stored file could not be read back
    Load,
    /// A mirror write failed
    Write,
    /// Nodes removed for good
    Purge,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryCategory::Load => "load",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Purge => "purge",
        })
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "load" => Some(RecoveryCategory::Load),
            "write" => Some(RecoveryCategory::Write),
            "purge" => Some(RecoveryCategory::Purge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

pub fn recovery_log_path(arbor_dir: &Path) -> PathBuf {
    arbor_dir.join(".recovery.log")
}

// ---------------------------------------------------------------------------
// Atomic file write
// ---------------------------------------------------------------------------

/// Write `content` to `path` through a sibling temp file and a rename, so
/// readers see either the old file or the new one.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

impl RecoveryEntry {
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    /// JSON form for `arb recovery --json`.
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

/// Append an entry. Failures are logged, never returned: the journal is the
/// last resort and has nowhere further to report to.
pub fn log_recovery(arbor_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(arbor_dir, &entry) {
        tracing::warn!(error = %e, dir = %arbor_dir.display(), "could not write to recovery log");
    }
}

fn append_entry(arbor_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(arbor_dir);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    if size > MAX_LOG_SIZE {
        let content = std::fs::read_to_string(&path)?;
        atomic_write(&path, keep_newest_half(&content).as_bytes())?;
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

fn keep_newest_half(content: &str) -> String {
    let blocks = split_blocks(content);
    let skip = blocks.len() / 2;
    let mut out = FILE_HEADER.to_string();
    for block in blocks.into_iter().skip(skip) {
        out.push_str(&block);
    }
    out
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them.
pub fn read_recovery_entries(arbor_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(arbor_dir)) else {
        return Vec::new();
    };
    let mut entries: Vec<RecoveryEntry> = split_blocks(&content)
        .iter()
        .filter_map(|block| parse_block(block))
        .collect();
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

/// Drop entries older than `before` (default: [`PRUNE_AGE_DAYS`] ago), or
/// every entry with `all`. Returns how many were dropped.
pub fn prune_recovery(
    arbor_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(arbor_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));

    let mut kept = FILE_HEADER.to_string();
    let mut dropped = 0;
    for block in split_blocks(&content) {
        match parse_block(&block) {
            Some(entry) if !all && entry.timestamp >= cutoff => kept.push_str(&block),
            _ => dropped += 1,
        }
    }
    atomic_write(&path, kept.as_bytes())?;
    Ok(dropped)
}

/// Raw entry blocks (header line through the closing `---`), oldest first.
fn split_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;
    let mut in_body = false;
    for line in content.lines() {
        if line.starts_with("```") {
            in_body = !in_body;
        }
        if !in_body && line.starts_with("## ") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(String::new());
        }
        if let Some(block) = current.as_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

fn parse_block(block: &str) -> Option<RecoveryEntry> {
    let mut lines = block.lines();
    let (timestamp, category, description) = parse_header(lines.next()?.strip_prefix("## ")?)?;

    let mut fields = Vec::new();
    let mut body = String::new();
    let mut in_body = false;
    for line in lines {
        if line.starts_with("```") {
            in_body = !in_body;
            continue;
        }
        if in_body {
            body.push_str(line);
            body.push('\n');
        } else if line == "---" {
            break;
        } else if let Some((key, value)) = line.split_once(": ") {
            fields.push((key.to_string(), value.to_string()));
        }
    }
    if body.ends_with('\n') {
        body.pop();
    }

    Some(RecoveryEntry {
        timestamp,
        category,
        description,
        fields,
        body,
    })
}

/// `<rfc3339> [<category>] <description>`
fn parse_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp, rest) = header.split_once(" [")?;
    let (category, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    let category = RecoveryCategory::parse_category(category)?;
    Some((timestamp, category, description.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(description: &str, body: &str) -> RecoveryEntry {
        RecoveryEntry::new(RecoveryCategory::Write, description)
            .field("Nodes", "2")
            .body(body)
    }

    #[test]
    fn log_and_read_newest_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry("first", "[1]"));
        log_recovery(tmp.path(), entry("second", "[2]"));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].body, "[2]");
        assert_eq!(entries[0].fields, vec![("Nodes".to_string(), "2".to_string())]);
        assert_eq!(read_recovery_entries(tmp.path(), Some(1)).len(), 1);
    }

    #[test]
    fn body_with_header_like_lines() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry("tricky", "## not a header\n---"));
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "## not a header\n---");
    }

    #[test]
    fn prune_drops_old_entries() {
        let tmp = TempDir::new().unwrap();
        let mut old = entry("old", "");
        old.timestamp = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS + 1);
        log_recovery(tmp.path(), old);
        log_recovery(tmp.path(), entry("new", ""));

        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 1);
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "new");

        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 1);
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
        let content = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert!(content.contains("arbor recovery log"));
    }

    #[test]
    fn prune_missing_log() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 0);
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nodes.json");
        atomic_write(&path, b"[]").unwrap();
        atomic_write(&path, b"[1]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
    }

    #[test]
    fn header_parsing() {
        let (ts, category, description) =
            parse_header("2026-02-10T14:32:05.000Z [purge] 3 nodes").unwrap();
        assert_eq!(category, RecoveryCategory::Purge);
        assert_eq!(description, "3 nodes");
        assert_eq!(ts.timestamp(), 1_770_733_925);
        assert!(parse_header("nonsense").is_none());
        assert!(parse_header("2026-02-10T14:32:05Z [bogus] x").is_none());
    }

    #[test]
    fn entry_to_json() {
        let json = entry("failed", "[]").to_json();
        assert_eq!(json["category"], "write");
        assert_eq!(json["fields"]["Nodes"], "2");
        assert_eq!(json["body"], "[]");
    }
}
