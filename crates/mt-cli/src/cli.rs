//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::catalog::LabelCommand;
use crate::commands::edit::{DeleteArgs, EditArgs, MergeArgs, SplitArgs};
use crate::commands::lifecycle::{PauseArgs, ResumeArgs, StartArgs, StopArgs};
use crate::commands::logs::{ListArgs, ShowArgs};
use crate::commands::record::RecordCommand;

/// Log-and-record time tracker.
///
/// Work is tracked in logs; each log owns records, the time intervals spent
/// on it. At most one record is open at a time.
#[derive(Debug, Parser)]
#[command(name = "mt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Act at this time instead of now (RFC 3339 or e.g. "2 hours ago").
    #[arg(long, global = true, value_name = "TIME")]
    pub at: Option<String>,

    /// Shift the request time by a signed duration (e.g. -15m, +1h30m).
    #[arg(long, global = true, allow_hyphen_values = true, value_name = "DURATION")]
    pub shift: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new log, pausing whatever is running.
    Start(StartArgs),

    /// Stop the running log and start a new one.
    Next(StartArgs),

    /// Stop a log (the active one by default).
    Stop(StopArgs),

    /// Pause a log (the active one by default).
    Pause(PauseArgs),

    /// Resume a log, pausing whatever is running.
    Resume(ResumeArgs),

    /// Show the running log.
    Active,

    /// Show one log with its records.
    Show(ShowArgs),

    /// List logs, most recently active first.
    List(ListArgs),

    /// Change a log (the active one by default).
    Edit(EditArgs),

    /// Delete a log and its records.
    Delete(DeleteArgs),

    /// Split a log in two at the request time.
    Split(SplitArgs),

    /// Move every record of one log into another.
    Merge(MergeArgs),

    /// Manage tasks.
    Task {
        #[command(subcommand)]
        action: LabelCommand,
    },

    /// Manage categories.
    Category {
        #[command(subcommand)]
        action: LabelCommand,
    },

    /// Inspect and edit single records.
    Record {
        #[command(subcommand)]
        action: RecordCommand,
    },
}
