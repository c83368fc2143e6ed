use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use crate::model::node::NodeKind;

#[derive(Parser)]
#[command(name = "arb", about = concat!("arbor v", env!("CARGO_PKG_VERSION"), " - folders and tasks as an outline"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a .arbor/ workspace in the current directory
    Init(InitArgs),
    /// Print the outline
    Ls(LsArgs),
    /// Show one node in full
    Show(IdArg),
    /// Validate the tree's structure
    Check,
    /// Create a folder or task
    Add(AddArgs),
    /// Change a node's fields
    Edit(EditArgs),
    /// Expand or collapse a folder
    Toggle(IdArg),
    /// Flip a task between todo and done
    Done(IdArg),
    /// Mark every task inside a folder done
    Complete(IdArg),
    /// Move a node
    Mv(MvArgs),
    /// Move a node into the folder just above it
    Indent(IdArg),
    /// Move a node up one level
    Outdent(IdArg),
    /// Move a node and its subtree to the trash
    Rm(IdArg),
    /// Bring a node back from the trash
    Restore(IdArg),
    /// Delete a node and its subtree for good (clears undo history)
    Purge(IdArg),
    /// Undo the last change
    Undo,
    /// Redo the last undone change
    Redo,
    /// Create nodes from a JSON template
    Import(ImportArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

#[derive(Args)]
pub struct IdArg {
    /// Node ID
    pub id: String,
}

#[derive(Args)]
pub struct InitArgs {
    /// Folder nesting limit (default: 5)
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Undo history size (default: 50)
    #[arg(long)]
    pub history_limit: Option<usize>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Ignore collapsed folders and show everything
    #[arg(long)]
    pub all: bool,
    /// List the trash instead
    #[arg(long, conflicts_with = "all")]
    pub trash: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Folder,
    Task,
}

impl From<KindArg> for NodeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Folder => NodeKind::Folder,
            KindArg::Task => NodeKind::Task,
        }
    }
}

#[derive(Args)]
pub struct AddArgs {
    /// folder or task
    pub kind: KindArg,
    /// Title
    pub title: String,
    /// Parent folder ID (default: root level)
    #[arg(long)]
    pub parent: Option<String>,
    /// Body text
    #[arg(long)]
    pub content: Option<String>,
    /// Background colour, e.g. "#E8D5F5"
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Node ID
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    /// Body text (empty string clears it)
    #[arg(long)]
    pub content: Option<String>,
    /// Background colour (empty string clears it)
    #[arg(long)]
    pub color: Option<String>,
    /// Logged work in minutes
    #[arg(long)]
    pub duration: Option<u32>,
}

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["into", "root", "above", "below"])))]
pub struct MvArgs {
    /// Node ID
    pub id: String,
    /// Make it the last child of this folder
    #[arg(long)]
    pub into: Option<String>,
    /// Move it to the root level
    #[arg(long)]
    pub root: bool,
    /// Drop it above this node
    #[arg(long)]
    pub above: Option<String>,
    /// Drop it below this node
    #[arg(long)]
    pub below: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file with an array of template nodes
    pub file: String,
    /// Folder to import into (default: root level)
    #[arg(long)]
    pub parent: Option<String>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mv_requires_a_target() {
        assert!(Cli::try_parse_from(["arb", "mv", "task-1"]).is_err());
        assert!(Cli::try_parse_from(["arb", "mv", "task-1", "--root", "--into", "f"]).is_err());
        let cli = Cli::try_parse_from(["arb", "mv", "task-1", "--above", "task-2"]).unwrap();
        assert!(matches!(cli.command, Commands::Mv(MvArgs { above: Some(_), .. })));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["arb", "ls", "--json", "-C", "/tmp"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.workspace_dir.as_deref(), Some("/tmp"));
    }
}
