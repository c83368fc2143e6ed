use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::io::workspace_io::WorkspaceError;
use crate::model::config::ArborConfig;

const CONFIG_TEMPLATE: &str = r##"# arbor workspace configuration

[tree]
# Folder nesting limit, in levels (the root level is level 1)
max_depth = {max_depth}

[history]
# Snapshots kept on each of the undo and redo stacks
limit = {history_limit}
# Keep undo/redo between commands in history.json
persist = {persist}

[store]
# Node rows, relative to .arbor/
file = {store_file}
"##;

pub fn config_path(arbor_dir: &Path) -> PathBuf {
    arbor_dir.join("config.toml")
}

/// Read `config.toml`. A missing file means all defaults.
pub fn read_config(arbor_dir: &Path) -> Result<ArborConfig, WorkspaceError> {
    let path = config_path(arbor_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ArborConfig::default()),
        Err(source) => return Err(WorkspaceError::ReadError { path, source }),
    };
    Ok(toml::from_str(&text)?)
}

/// The commented config file for `config`.
pub fn render_config(config: &ArborConfig) -> String {
    CONFIG_TEMPLATE
        .replace("{max_depth}", &config.tree.max_depth.to_string())
        .replace("{history_limit}", &config.history.limit.to_string())
        .replace("{persist}", &config.history.persist.to_string())
        .replace(
            "{store_file}",
            &toml::Value::String(config.store.file.clone()).to_string(),
        )
}

pub fn write_config(arbor_dir: &Path, config: &ArborConfig) -> Result<(), WorkspaceError> {
    let path = config_path(arbor_dir);
    atomic_write(&path, render_config(config).as_bytes())
        .map_err(|source| WorkspaceError::WriteError { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config(tmp.path()).unwrap();
        assert_eq!(config.tree.max_depth, 5);
        assert_eq!(config.history.limit, 50);
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let mut config = ArborConfig::default();
        config.tree.max_depth = 7;
        config.history.persist = false;
        write_config(tmp.path(), &config).unwrap();

        let text = fs::read_to_string(config_path(tmp.path())).unwrap();
        assert!(text.contains("# Folder nesting limit"));
        assert!(text.contains("file = \"nodes.json\""));
        let back = read_config(tmp.path()).unwrap();
        assert_eq!(back.tree.max_depth, 7);
        assert!(!back.history.persist);
    }

    #[test]
    fn rendered_default_parses_back() {
        let config: ArborConfig = toml::from_str(&render_config(&ArborConfig::default())).unwrap();
        assert_eq!(config, ArborConfig::default());
    }

    #[test]
    fn bad_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(config_path(tmp.path()), "[tree]\nmax_depth = \"deep\"\n").unwrap();
        assert!(matches!(
            read_config(tmp.path()),
            Err(WorkspaceError::ConfigParseError(_))
        ));
    }
}
