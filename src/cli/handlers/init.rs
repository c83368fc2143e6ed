use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::write_config;
use crate::io::workspace_io;

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if args.max_depth == Some(0) {
        return Err("--max-depth must be at least 1".into());
    }
    let mut workspace = workspace_io::init_workspace(dir)?;

    if args.max_depth.is_some() || args.history_limit.is_some() {
        if let Some(max_depth) = args.max_depth {
            workspace.config.tree.max_depth = max_depth;
        }
        if let Some(limit) = args.history_limit {
            workspace.config.history.limit = limit;
        }
        write_config(&workspace.arbor_dir, &workspace.config)?;
    }

    println!("initialized arbor workspace in {}", workspace.arbor_dir.display());
    println!(
        "  max depth {}, history limit {}",
        workspace.config.tree.max_depth, workspace.config.history.limit
    );
    Ok(())
}
