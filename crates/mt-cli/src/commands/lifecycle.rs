//! Start, next, stop, pause and resume.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use mt_core::{DynamicId, Log, NewLog};
use mt_db::{CreateMissing, StopOutcome, Tracker};

use super::Invocation;
use super::logs::FilterArgs;
use super::output::{LogView, write_json};
use super::util::{format_time, parse_meta};

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Name of the new log.
    pub name: Option<String>,

    /// Category name.
    #[arg(long)]
    pub category: Option<String>,

    /// Task name.
    #[arg(long)]
    pub task: Option<String>,

    /// Flag to attach (repeatable).
    #[arg(long = "flag", value_name = "FLAG")]
    pub flags: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Arbitrary JSON object stored with the log.
    #[arg(long, value_name = "JSON")]
    pub meta: Option<String>,

    /// Create the category if no category has that name.
    #[arg(long)]
    pub create_category: bool,

    /// Create the task if no task has that name.
    #[arg(long)]
    pub create_task: bool,
}

impl StartArgs {
    fn new_log(&self) -> Result<NewLog> {
        Ok(NewLog {
            category: self.category.clone(),
            task: self.task.clone(),
            flags: (!self.flags.is_empty()).then(|| self.flags.clone()),
            meta: self.meta.as_deref().map(parse_meta).transpose()?,
            name: self.name.clone(),
            description: self.description.clone(),
        })
    }

    const fn create_missing(&self) -> CreateMissing {
        CreateMissing {
            category: self.create_category,
            task: self.create_task,
        }
    }
}

#[derive(Debug, Args)]
pub struct StopArgs {
    /// Log to stop; negative values count back from the most recent log.
    #[arg(allow_negative_numbers = true, conflicts_with = "all")]
    pub id: Option<DynamicId>,

    /// Stop every log matching the filters instead.
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub filter: StopFilterArgs,
}

/// The `list` filters, accepted by `stop` only together with `--all`.
#[derive(Debug, Default, Args)]
pub struct StopFilterArgs {
    /// Category name.
    #[arg(long, requires = "all")]
    pub category: Option<String>,

    #[arg(long, value_name = "ID", requires = "all")]
    pub category_id: Option<i64>,

    /// Task name.
    #[arg(long, requires = "all")]
    pub task: Option<String>,

    #[arg(long, value_name = "ID", requires = "all")]
    pub task_id: Option<i64>,

    /// Match logs carrying this flag (repeatable; any flag matches).
    #[arg(long = "flag", value_name = "FLAG", requires = "all")]
    pub flags: Vec<String>,

    #[arg(long, value_name = "TIME", requires = "all")]
    pub since: Option<String>,

    #[arg(long, value_name = "TIME", requires = "all")]
    pub until: Option<String>,
}

impl From<&StopFilterArgs> for FilterArgs {
    fn from(args: &StopFilterArgs) -> Self {
        Self {
            category: args.category.clone(),
            category_id: args.category_id,
            task: args.task.clone(),
            task_id: args.task_id,
            flags: args.flags.clone(),
            since: args.since.clone(),
            until: args.until.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct PauseArgs {
    /// Log to pause.
    pub id: Option<i64>,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Log to resume; negative values count back from the most recent log.
    #[arg(allow_negative_numbers = true)]
    pub id: DynamicId,
}

#[derive(Serialize)]
struct StopView<'a> {
    stopped: LogView<'a>,
    resumed: Option<LogView<'a>>,
}

#[derive(Serialize)]
struct StopAllView<'a> {
    stopped: Vec<LogView<'a>>,
}

fn write_action<W: Write>(
    writer: &mut W,
    verb: &str,
    log: &Log,
    invocation: &Invocation,
) -> Result<()> {
    if invocation.json {
        return write_json(writer, &LogView::new(log, invocation.at));
    }
    writeln!(
        writer,
        "{verb} log {}: {} at {}",
        log.id,
        log.name,
        format_time(invocation.at)
    )?;
    Ok(())
}

pub fn start<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &StartArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .start_log(&args.new_log()?, args.create_missing(), invocation.at)
        .context("failed to start log")?;
    write_action(writer, "Started", &log, invocation)
}

pub fn next<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &StartArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .next_log(&args.new_log()?, args.create_missing(), invocation.at)
        .context("failed to start next log")?;
    write_action(writer, "Started", &log, invocation)
}

pub fn stop<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &StopArgs,
    invocation: &Invocation,
) -> Result<()> {
    if args.all {
        let filter = FilterArgs::from(&args.filter).to_filter(invocation.at)?;
        let stopped = tracker
            .stop_all_logs(&filter, invocation.at)
            .context("failed to stop logs")?;
        if invocation.json {
            let view = StopAllView {
                stopped: stopped
                    .iter()
                    .map(|log| LogView::new(log, invocation.at))
                    .collect(),
            };
            return write_json(writer, &view);
        }
        if stopped.is_empty() {
            writeln!(writer, "No logs matched.")?;
        }
        for log in &stopped {
            write_action(writer, "Stopped", log, invocation)?;
        }
        return Ok(());
    }

    let outcome = match args.id {
        Some(id) => tracker.stop_log(id, invocation.at),
        None => tracker.stop_active_log(invocation.at),
    }
    .context("failed to stop log")?;
    write_stop(writer, &outcome, invocation)
}

fn write_stop<W: Write>(
    writer: &mut W,
    outcome: &StopOutcome,
    invocation: &Invocation,
) -> Result<()> {
    if invocation.json {
        let view = StopView {
            stopped: LogView::new(&outcome.log, invocation.at),
            resumed: outcome
                .resumed
                .as_ref()
                .map(|log| LogView::new(log, invocation.at)),
        };
        return write_json(writer, &view);
    }
    write_action(writer, "Stopped", &outcome.log, invocation)?;
    if let Some(resumed) = &outcome.resumed {
        write_action(writer, "Resumed", resumed, invocation)?;
    }
    Ok(())
}

pub fn pause<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &PauseArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = match args.id {
        Some(id) => tracker.pause_log(id, invocation.at),
        None => tracker.pause_active_log(invocation.at),
    }
    .context("failed to pause log")?;
    write_action(writer, "Paused", &log, invocation)
}

pub fn resume<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &ResumeArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .resume_log(args.id, invocation.at)
        .context("failed to resume log")?;
    write_action(writer, "Resumed", &log, invocation)
}
