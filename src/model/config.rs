use serde::{Deserialize, Serialize};

/// Default folder nesting limit, counted in levels with the root level as 1
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default number of undo (and redo) snapshots kept
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Configuration from `.arbor/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArborConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    /// Keep undo/redo across CLI invocations in `history.json`
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            limit: DEFAULT_HISTORY_LIMIT,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Node file, relative to `.arbor/`
    #[serde(default = "default_store_file")]
    pub file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            file: default_store_file(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_store_file() -> String {
    "nodes.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ArborConfig = toml::from_str("").unwrap();
        assert_eq!(config, ArborConfig::default());
        assert_eq!(config.tree.max_depth, 5);
        assert_eq!(config.history.limit, 50);
        assert!(config.history.persist);
        assert_eq!(config.store.file, "nodes.json");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: ArborConfig = toml::from_str("[history]\nlimit = 10\n").unwrap();
        assert_eq!(config.history.limit, 10);
        assert!(config.history.persist);
        assert_eq!(config.tree.max_depth, DEFAULT_MAX_DEPTH);
    }
}
