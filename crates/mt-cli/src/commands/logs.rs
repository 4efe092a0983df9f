//! Read-only log views: active, show and list.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use mt_core::{DynamicId, LogFilter, SortOrder};
use mt_db::{TrackError, Tracker};

use super::Invocation;
use super::output::{Labels, write_log, write_log_table};
use super::util::parse_datetime;

/// Selection for `list`; `stop --all` takes the same flags.
#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    /// Category name.
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, value_name = "ID")]
    pub category_id: Option<i64>,

    /// Task name.
    #[arg(long)]
    pub task: Option<String>,

    #[arg(long, value_name = "ID")]
    pub task_id: Option<i64>,

    /// Match logs carrying this flag (repeatable; any flag matches).
    #[arg(long = "flag", value_name = "FLAG")]
    pub flags: Vec<String>,

    /// Only logs with a record starting or ending at or after this time.
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,

    /// Only logs with a record starting or ending at or before this time.
    #[arg(long, value_name = "TIME")]
    pub until: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self, now: DateTime<Utc>) -> Result<LogFilter> {
        Ok(LogFilter {
            category_id: self.category_id,
            category: self.category.clone(),
            task_id: self.task_id,
            task: self.task.clone(),
            stopped: None,
            flags: self.flags.clone(),
            since: self
                .since
                .as_deref()
                .map(|s| parse_datetime(s, now))
                .transpose()
                .context("invalid --since")?,
            until: self
                .until
                .as_deref()
                .map(|s| parse_datetime(s, now))
                .transpose()
                .context("invalid --until")?,
            order: SortOrder::default(),
        })
    }
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Log id; negative values count back from the most recent log.
    #[arg(allow_negative_numbers = true)]
    pub id: DynamicId,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Only stopped (true) or only unstopped (false) logs.
    #[arg(long, value_name = "BOOL")]
    pub stopped: Option<bool>,

    /// Only logs that `resume` would pick up: not stopped and not running.
    #[arg(
        long,
        conflicts_with_all = [
            "stopped", "category", "category_id", "task", "task_id", "flags", "since", "until",
        ]
    )]
    pub paused: bool,

    /// Sort by most recent (desc) or earliest (asc) activity.
    #[arg(long, default_value_t = SortOrder::Desc)]
    pub order: SortOrder,
}

pub fn active<W: Write>(writer: &mut W, tracker: &Tracker, invocation: &Invocation) -> Result<()> {
    let log = match tracker.get_active_log() {
        Ok(log) => log,
        Err(TrackError::NoActiveLog) => {
            if invocation.json {
                writeln!(writer, "null")?;
            } else {
                writeln!(writer, "No active log.")?;
            }
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to find the active log"),
    };
    let labels = Labels::load(tracker)?;
    write_log(writer, &log, &labels, invocation.at, invocation.json)
}

pub fn show<W: Write>(
    writer: &mut W,
    tracker: &Tracker,
    args: &ShowArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .get_log(args.id)
        .with_context(|| format!("failed to load log {}", args.id))?;
    let labels = Labels::load(tracker)?;
    write_log(writer, &log, &labels, invocation.at, invocation.json)
}

pub fn list<W: Write>(
    writer: &mut W,
    tracker: &Tracker,
    args: &ListArgs,
    invocation: &Invocation,
) -> Result<()> {
    if args.paused {
        let mut logs = tracker
            .list_paused_logs()
            .context("failed to list paused logs")?;
        if args.order == SortOrder::Asc {
            logs.reverse();
        }
        let labels = Labels::load(tracker)?;
        return write_log_table(writer, &logs, &labels, invocation.at, invocation.json);
    }

    let filter = LogFilter {
        stopped: args.stopped,
        order: args.order,
        ..args.filter.to_filter(invocation.at)?
    };
    let logs = tracker.list_logs(&filter).context("failed to list logs")?;
    let labels = Labels::load(tracker)?;
    write_log_table(writer, &logs, &labels, invocation.at, invocation.json)
}
