mod init;
pub use init::cmd_init;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::lock::WorkspaceLock;
use crate::io::recovery;
use crate::io::store::{JsonFileStore, NodeStore};
use crate::io::workspace_io::{self, Workspace, WorkspaceError};
use crate::model::node::{NewNode, NodePatch, TaskStatus};
use crate::model::tree::Tree;
use crate::ops::check::{self, CheckError, CheckWarning};
use crate::ops::move_ops::DropPosition;
use crate::ops::query::{self, VisibleNode};
use crate::ops::{TreeError, import};
use crate::outliner::Outliner;

/// Entries shown by `arb recovery` without --limit
const DEFAULT_RECOVERY_LIMIT: usize = 10;

/// Where a command runs and how it reports
struct Session {
    start: PathBuf,
    json: bool,
}

impl Session {
    fn workspace(&self) -> Result<Workspace, WorkspaceError> {
        let root = workspace_io::discover_workspace(&self.start)?;
        workspace_io::load_workspace(&root)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start = match &cli.workspace_dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    let session = Session {
        start,
        json: cli.json,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(args, &session.start),

        // Read commands
        Commands::Ls(args) => cmd_ls(&session, args),
        Commands::Show(args) => cmd_show(&session, args),
        Commands::Check => cmd_check(&session),

        // Write commands
        Commands::Add(args) => cmd_add(&session, args),
        Commands::Edit(args) => cmd_edit(&session, args),
        Commands::Toggle(args) => cmd_toggle(&session, args),
        Commands::Done(args) => cmd_done(&session, args),
        Commands::Complete(args) => cmd_complete(&session, args),
        Commands::Mv(args) => cmd_mv(&session, args),
        Commands::Indent(args) => cmd_indent(&session, args),
        Commands::Outdent(args) => cmd_outdent(&session, args),
        Commands::Rm(args) => cmd_rm(&session, args),
        Commands::Restore(args) => cmd_restore(&session, args),
        Commands::Purge(args) => cmd_purge(&session, args),
        Commands::Undo => cmd_undo(&session),
        Commands::Redo => cmd_redo(&session),

        // Maintenance
        Commands::Import(args) => cmd_import(&session, args),
        Commands::Recovery(args) => cmd_recovery(&session, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_tree(workspace: &Workspace) -> Result<Tree, Box<dyn std::error::Error>> {
    let nodes = JsonFileStore::new(workspace.store_path()).load()?;
    Ok(Tree::from_nodes(nodes))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one change under the workspace lock.
///
/// Unknown ids are errors. Any other refusal leaves the tree untouched, is
/// reported as a notice and yields `None`.
fn mutate<T>(
    session: &Session,
    op: &str,
    f: impl FnOnce(&mut Outliner) -> Result<T, TreeError>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let workspace = session.workspace()?;
    let _lock = WorkspaceLock::acquire_default(&workspace.arbor_dir)?;
    let mut outliner = workspace_io::open_outliner(&workspace)?;
    let outcome = f(&mut outliner);
    workspace_io::close_outliner(&workspace, &outliner)?;

    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_lookup() => Err(e.into()),
        Err(e) => {
            if session.json {
                print_json(&ChangeJson {
                    applied: false,
                    op,
                    reason: Some(e.to_string()),
                    ids: Vec::new(),
                })?;
            } else {
                eprintln!("nothing changed: {}", e);
            }
            Ok(None)
        }
    }
}

/// Confirm an applied change.
fn report(
    session: &Session,
    op: &str,
    ids: Vec<String>,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.json {
        print_json(&ChangeJson {
            applied: true,
            op,
            reason: None,
            ids,
        })
    } else {
        println!("{}", message);
        Ok(())
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}' (expected RFC 3339 or YYYY-MM-DD)", s))
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_ls(session: &Session, args: LsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = session.workspace()?;
    let tree = load_tree(&workspace)?;

    if args.trash {
        let nodes = query::deleted_nodes(&tree);
        if session.json {
            print_json(&nodes)?;
        } else if nodes.is_empty() {
            println!("trash is empty");
        } else {
            for line in format_trash(&tree, &nodes) {
                println!("{}", line);
            }
        }
        return Ok(());
    }

    let rows = if args.all {
        query::all_live_nodes(&tree)
    } else {
        query::visible_nodes(&tree)
    };
    if session.json {
        let out: Vec<RowJson> = rows.iter().map(|r| row_to_json(&tree, r)).collect();
        print_json(&out)?;
    } else if rows.is_empty() {
        println!("(empty)");
    } else {
        for line in format_listing(&rows) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = session.workspace()?;
    let tree = load_tree(&workspace)?;
    let node = tree
        .get(&args.id)
        .ok_or_else(|| TreeError::NotFound(args.id.clone()))?;

    if session.json {
        let row = VisibleNode {
            node,
            depth: query::depth_of(&tree, &node.id),
        };
        print_json(&row_to_json(&tree, &row))?;
    } else {
        for line in format_node_detail(&tree, node) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_check(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = session.workspace()?;
    let tree = load_tree(&workspace)?;
    let max_depth = workspace.config.tree.max_depth;
    let result = check::check_tree(&tree, max_depth);

    if session.json {
        return print_json(&result);
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                CheckError::MissingParent { node_id, parent_id } => {
                    println!("  {} points at missing parent {}", node_id, parent_id);
                }
                CheckError::ParentIsTask { node_id, parent_id } => {
                    println!("  {} has task {} as its parent", node_id, parent_id);
                }
                CheckError::Cycle { node_id } => {
                    println!("  {} is part of a parent cycle", node_id);
                }
                CheckError::ZoneViolation {
                    parent_id,
                    folder_id,
                    task_id,
                } => {
                    println!(
                        "  task {} is ordered before folder {} in {}",
                        task_id,
                        folder_id,
                        parent_id.as_deref().unwrap_or("the root level")
                    );
                }
                CheckError::NonDenseOrder { parent_id, orders } => {
                    println!(
                        "  children of {} have orders {:?}",
                        parent_id.as_deref().unwrap_or("the root level"),
                        orders
                    );
                }
                CheckError::DepthExceeded { folder_id, depth } => {
                    println!(
                        "  folder {} at depth {} exceeds max depth {}",
                        folder_id, depth, max_depth
                    );
                }
                CheckError::SubtreeTooDeep {
                    folder_id,
                    depth,
                    subtree_depth,
                } => {
                    println!(
                        "  folder {} at depth {} holds {} more level{}, reaching max depth {}",
                        folder_id,
                        depth,
                        subtree_depth,
                        plural(*subtree_depth),
                        max_depth
                    );
                }
                CheckError::LiveUnderDeleted { node_id, parent_id } => {
                    println!("  {} is live under deleted {}", node_id, parent_id);
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                CheckWarning::MissingStatus { node_id } => {
                    println!("  task {} has no status", node_id);
                }
                CheckWarning::MissingCompletedAt { node_id } => {
                    println!("  {} (done) has no completion date", node_id);
                }
                CheckWarning::MissingDeletedAt { node_id } => {
                    println!("  {} (deleted) has no deletion date", node_id);
                }
            }
        }
    }
    if result.valid {
        println!("✓ tree is valid");
    } else {
        println!("✗ tree has errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(session: &Session, args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let extra = NewNode {
        content: args.content,
        color: args.color,
        ..Default::default()
    };
    let Some(node) = mutate(session, "create", |o| {
        o.create(args.kind.into(), args.parent.as_deref(), &args.title, extra)
    })?
    else {
        return Ok(());
    };

    if session.json {
        print_json(&node)?;
    } else {
        println!("{}", node.id);
    }
    Ok(())
}

fn cmd_edit(session: &Session, args: EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    // An empty string clears the optional text fields
    let patch = NodePatch {
        title: args.title,
        content: args.content.map(|c| (!c.is_empty()).then_some(c)),
        color: args.color.map(|c| (!c.is_empty()).then_some(c)),
        work_duration_minutes: args.duration.map(Some),
        ..Default::default()
    };
    if patch.is_empty() {
        return Err("nothing to edit: pass --title, --content, --color or --duration".into());
    }

    if mutate(session, "update", |o| o.update(&args.id, &patch))?.is_some() {
        report(session, "update", vec![args.id.clone()], format!("updated {}", args.id))?;
    }
    Ok(())
}

fn cmd_toggle(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(expanded) = mutate(session, "toggle_expanded", |o| o.toggle_expanded(&args.id))? {
        let state = if expanded { "expanded" } else { "collapsed" };
        report(
            session,
            "toggle_expanded",
            vec![args.id.clone()],
            format!("{} {}", args.id, state),
        )?;
    }
    Ok(())
}

fn cmd_done(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(status) = mutate(session, "toggle_status", |o| o.toggle_status(&args.id))? {
        let state = match status {
            TaskStatus::Done => "done",
            TaskStatus::Todo => "todo",
        };
        report(
            session,
            "toggle_status",
            vec![args.id.clone()],
            format!("{} {}", args.id, state),
        )?;
    }
    Ok(())
}

fn cmd_complete(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ids) = mutate(session, "complete_folder", |o| o.complete_folder(&args.id))? {
        let message = format!("completed {} task{} in {}", ids.len(), plural(ids.len()), args.id);
        report(session, "complete_folder", ids, message)?;
    }
    Ok(())
}

fn cmd_mv(session: &Session, args: MvArgs) -> Result<(), Box<dyn std::error::Error>> {
    let MvArgs {
        id,
        into,
        root,
        above,
        below,
    } = args;
    let beside = above
        .map(|over| (over, DropPosition::Above))
        .or_else(|| below.map(|over| (over, DropPosition::Below)));

    let moved = mutate(session, "move", |o| match (into, beside) {
        (Some(target), _) => o.move_into(&id, &target),
        (None, Some((over, position))) => o.move_node(&id, &over, position),
        (None, None) if root => o.move_to_root(&id),
        (None, None) => Err(TreeError::AlreadyInPlace(id.clone())),
    })?;
    if moved.is_some() {
        report(session, "move", vec![id.clone()], format!("moved {}", id))?;
    }
    Ok(())
}

fn cmd_indent(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if mutate(session, "indent", |o| o.indent(&args.id))?.is_some() {
        report(session, "indent", vec![args.id.clone()], format!("indented {}", args.id))?;
    }
    Ok(())
}

fn cmd_outdent(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if mutate(session, "outdent", |o| o.outdent(&args.id))?.is_some() {
        report(session, "outdent", vec![args.id.clone()], format!("outdented {}", args.id))?;
    }
    Ok(())
}

fn cmd_rm(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ids) = mutate(session, "soft_delete", |o| o.soft_delete(&args.id))? {
        let message = format!("moved {} node{} to the trash", ids.len(), plural(ids.len()));
        report(session, "soft_delete", ids, message)?;
    }
    Ok(())
}

fn cmd_restore(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ids) = mutate(session, "restore", |o| o.restore(&args.id))? {
        let message = format!("restored {} node{}", ids.len(), plural(ids.len()));
        report(session, "restore", ids, message)?;
    }
    Ok(())
}

fn cmd_purge(session: &Session, args: IdArg) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ids) = mutate(session, "permanent_delete", |o| o.permanent_delete(&args.id))? {
        let message = format!(
            "purged {} node{}; undo history cleared",
            ids.len(),
            plural(ids.len())
        );
        report(session, "permanent_delete", ids, message)?;
    }
    Ok(())
}

fn cmd_undo(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    if mutate(session, "undo", |o| o.undo())?.is_some() {
        report(session, "undo", Vec::new(), "undone".to_string())?;
    }
    Ok(())
}

fn cmd_redo(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    if mutate(session, "redo", |o| o.redo())?.is_some() {
        report(session, "redo", Vec::new(), "redone".to_string())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn cmd_import(session: &Session, args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("could not read {}: {}", args.file, e))?;
    let nodes = import::parse_template(&text)?;

    let workspace = session.workspace()?;
    let _lock = WorkspaceLock::acquire_default(&workspace.arbor_dir)?;
    let mut outliner = workspace_io::open_outliner(&workspace)?;
    let result = import::apply_template(&mut outliner, nodes, args.parent.as_deref());
    workspace_io::close_outliner(&workspace, &outliner)?;
    let result = result?;

    if session.json {
        let created: Vec<serde_json::Value> = result
            .created
            .iter()
            .map(|(template, id)| serde_json::json!({ "template": template, "id": id }))
            .collect();
        let skipped: Vec<serde_json::Value> = result
            .skipped
            .iter()
            .map(|(template, reason)| serde_json::json!({ "template": template, "reason": reason }))
            .collect();
        return print_json(&serde_json::json!({ "created": created, "skipped": skipped }));
    }

    println!(
        "imported {} node{}",
        result.created.len(),
        plural(result.created.len())
    );
    for (template, id) in &result.created {
        println!("  {} -> {}", template, id);
    }
    if !result.skipped.is_empty() {
        println!("skipped {}:", result.skipped.len());
        for (template, reason) in &result.skipped {
            println!("  {}: {}", template, reason);
        }
    }
    Ok(())
}

fn cmd_recovery(session: &Session, args: RecoveryCmd) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = session.workspace()?;

    match args.action {
        Some(RecoveryAction::Path) => {
            println!(
                "{}",
                recovery::recovery_log_path(&workspace.arbor_dir).display()
            );
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune.before.as_deref().map(parse_timestamp).transpose()?;
            let _lock = WorkspaceLock::acquire_default(&workspace.arbor_dir)?;
            let dropped = recovery::prune_recovery(&workspace.arbor_dir, before, prune.all)?;
            if session.json {
                print_json(&serde_json::json!({ "pruned": dropped }))?;
            } else {
                println!("pruned {} entr{}", dropped, if dropped == 1 { "y" } else { "ies" });
            }
        }
        None => {
            let limit = args.limit.unwrap_or(DEFAULT_RECOVERY_LIMIT);
            let entries = recovery::read_recovery_entries(&workspace.arbor_dir, Some(limit));
            if session.json {
                let out: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&out);
            }
            if entries.is_empty() {
                println!("no recovery entries");
                return Ok(());
            }
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!(
                    "{} [{}] {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.category,
                    entry.description
                );
                for (key, value) in &entry.fields {
                    println!("  {}: {}", key, value);
                }
                for line in entry.body.lines() {
                    println!("    {}", line);
                }
            }
        }
    }
    Ok(())
}
