use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gtd", about = concat!("gtd v", env!("CARGO_PKG_VERSION"), " - getting things done from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory (default: $GTD_DIR, then ~/.gtd)
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a top-level task
    Add(AddArgs),
    /// Add a subtask under any task
    Sub(SubArgs),
    /// Delete a task and its subtasks
    Rm(IdArgs),
    /// Change fields of a task
    Edit(EditArgs),
    /// Toggle completion (cascades to subtasks)
    Done(IdArgs),
    /// Toggle the archived flag
    Archive(IdArgs),
    /// List top-level tasks, filtered and sorted
    List(ListArgs),
    /// Show task details
    Show(IdArgs),
    /// Show task statistics
    Stats,
    /// Export all tasks as CSV
    Export(ExportArgs),
    /// Replace all tasks with a JSON array from a file
    Import(ImportArgs),
    /// Remove every completed task, subtasks included
    ClearCompleted,
    /// Follow the remote document and apply its changes
    Watch,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Match text, notes or tags (case-insensitive)
    #[arg(long, short)]
    pub search: Option<String>,
    /// Filter by status (completed, pending, overdue, due-soon)
    #[arg(long)]
    pub status: Option<String>,
    /// Filter by priority (urgent, high, medium, low)
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Task ID (any unique prefix)
    pub id: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    pub text: String,
    /// Priority (urgent, high, medium, low)
    #[arg(long, short)]
    pub priority: Option<String>,
    /// Due date: YYYY-MM-DD, YYYY-MM-DDTHH:MM or RFC 3339
    #[arg(long)]
    pub due: Option<String>,
    /// Notes (may contain simple HTML markup)
    #[arg(long)]
    pub notes: Option<String>,
    /// Tag (repeatable)
    #[arg(long, short)]
    pub tag: Vec<String>,
    /// Percent complete, 0-100
    #[arg(long)]
    pub progress: Option<u8>,
    /// Repeat cadence (daily, weekly, monthly)
    #[arg(long)]
    pub repeat: Option<String>,
    /// Last date a repeating task may fall on (a bare date covers the whole day)
    #[arg(long)]
    pub until: Option<String>,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent task ID
    pub id: String,
    /// Subtask text
    pub text: String,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    /// New text
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long, short)]
    pub priority: Option<String>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    /// Remove the due date
    #[arg(long)]
    pub clear_due: bool,
    #[arg(long)]
    pub notes: Option<String>,
    /// Replace all tags (repeatable)
    #[arg(long, short)]
    pub tag: Vec<String>,
    /// Remove all tags
    #[arg(long, conflicts_with = "tag")]
    pub clear_tags: bool,
    #[arg(long)]
    pub progress: Option<u8>,
    /// Repeat cadence (none, daily, weekly, monthly)
    #[arg(long)]
    pub repeat: Option<String>,
    #[arg(long, conflicts_with = "clear_until")]
    pub until: Option<String>,
    /// Remove the repeat-until bound
    #[arg(long)]
    pub clear_until: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file holding an array of tasks
    pub file: PathBuf,
}
