use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Watch long-running batch operations and get notified when they change state.
#[derive(Parser)]
#[command(name = "taskwatch", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print JSON Schema for operation records.
    Schema,
    /// Start watching operations and sending notifications.
    Start(StartArgs),
    /// Fetch operations once and print them.
    Tasks(TasksArgs),
    /// Send a test notification.
    Test(TestArgs),
}

/// Where to read operation listings from.
#[derive(Args, Default)]
pub struct SourceArgs {
    /// JSON file with the operation listing, re-read on every poll.
    #[arg(long, conflicts_with = "source_cmd")]
    pub source_file: Option<PathBuf>,

    /// Shell command printing the operation listing as JSON.
    #[arg(long)]
    pub source_cmd: Option<String>,
}

#[derive(Args, Default)]
pub struct StartArgs {
    /// Event types to notify for (or "all"). Defaults to completed, failed, error.
    pub watch_for: Vec<String>,

    /// One or more notifiers to use (or "all").
    #[arg(short = 'n', long = "notifier")]
    pub notifiers: Vec<String>,

    /// Minutes between polls.
    #[arg(short = 'i', long)]
    pub interval_mins: Option<f64>,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Default)]
pub struct TasksArgs {
    /// Maximum number of tasks displayed.
    #[arg(short, long, default_value_t = 30)]
    pub max_tasks: usize,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Default)]
pub struct TestArgs {
    /// One or more notifiers to test (or "all").
    #[arg(short = 'n', long = "notifier")]
    pub notifiers: Vec<String>,
}
