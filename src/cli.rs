use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Keep translated document trees in sync with a source tree.
#[derive(Parser)]
#[command(name = "transync", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Mirror the source tree into every target tree and refresh tasks.
    Sync(SyncArgs),
    /// Merge the filled translations of a task into the target documents.
    Apply(ApplyArgs),
    /// Fill a task's empty translations with Claude.
    Auto(AutoArgs),
    /// Show translation progress of a task.
    Status(StatusArgs),
    /// Inspect or clear the event log.
    Events(EventsArgs),
    /// Print JSON Schema for task files.
    Schema,
}

/// Options shared by every command.
#[derive(Args, Clone, Debug, Default)]
pub struct WorkspaceArgs {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true, env = "TRANSYNC_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to <root>/translate.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct SyncArgs {
    /// Only sync this target language.
    #[arg(long)]
    pub target: Option<String>,

    /// Plan only, do not touch the filesystem.
    #[arg(long)]
    pub dry_run: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ApplyArgs {
    /// Task file, or a target language code.
    pub task: PathBuf,

    /// Report what would change without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct AutoArgs {
    /// Task file, or a target language code.
    pub task: PathBuf,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model id (overrides translation.model from the configuration).
    #[arg(long)]
    pub model: Option<String>,

    /// Request timeout, e.g. `90s` or `2m`.
    #[arg(long, default_value = "120s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Apply the task right after filling it.
    #[arg(long)]
    pub apply: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct StatusArgs {
    /// Task file, or a target language code.
    pub task: PathBuf,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct EventsArgs {
    /// Only events of this session.
    #[arg(long)]
    pub session: Option<String>,

    /// Only events newer than this, e.g. `1h` or `30m`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub since: Option<Duration>,

    /// Print raw NDJSON records.
    #[arg(long)]
    pub json: bool,

    /// Delete the event log.
    #[arg(long, requires = "yes")]
    pub clear: bool,

    /// Confirm a destructive operation.
    #[arg(long)]
    pub yes: bool,
}
