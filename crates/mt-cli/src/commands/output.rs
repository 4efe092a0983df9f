//! Text and JSON rendering shared by the commands.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use mt_core::{Log, LogState, Record};
use mt_db::Tracker;

use super::util::{format_duration, format_time};

/// Category and task names keyed by id.
#[derive(Debug, Default)]
pub struct Labels {
    categories: HashMap<i64, String>,
    tasks: HashMap<i64, String>,
}

impl Labels {
    pub fn load(tracker: &Tracker) -> Result<Self> {
        Ok(Self {
            categories: tracker
                .list_categories()?
                .into_iter()
                .map(|category| (category.id, category.name))
                .collect(),
            tasks: tracker
                .list_tasks()?
                .into_iter()
                .map(|task| (task.id, task.name))
                .collect(),
        })
    }

    fn category(&self, id: i64) -> String {
        self.categories
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn task(&self, id: i64) -> String {
        self.tasks.get(&id).cloned().unwrap_or_else(|| format!("#{id}"))
    }
}

/// A log with the values derived from its records.
#[derive(Debug, Serialize)]
pub struct LogView<'a> {
    #[serde(flatten)]
    pub log: &'a Log,
    pub state: LogState,
    pub duration_seconds: i64,
}

impl<'a> LogView<'a> {
    pub fn new(log: &'a Log, now: DateTime<Utc>) -> Self {
        Self {
            log,
            state: log.state(),
            duration_seconds: log.total_duration(now).num_seconds(),
        }
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Full description of one log.
pub fn write_log<W: Write>(
    writer: &mut W,
    log: &Log,
    labels: &Labels,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    if json {
        return write_json(writer, &LogView::new(log, now));
    }

    writeln!(writer, "Log {}: {} ({})", log.id, log.name, log.state())?;
    if let Some(category_id) = log.category_id {
        writeln!(writer, "  Category: {}", labels.category(category_id))?;
    }
    if let Some(task_id) = log.task_id {
        writeln!(writer, "  Task: {}", labels.task(task_id))?;
    }
    if !log.flags.is_empty() {
        writeln!(writer, "  Flags: {}", log.flags.join(", "))?;
    }
    if let Some(description) = &log.description {
        writeln!(writer, "  Description: {description}")?;
    }
    if log.records.is_empty() {
        writeln!(writer, "  No records.")?;
    } else {
        writeln!(writer, "  Records:")?;
        for record in &log.records {
            write!(writer, "    ")?;
            write_record_line(writer, record, now)?;
        }
    }
    writeln!(writer, "  Total: {}", format_duration(log.total_duration(now)))?;
    Ok(())
}

/// One line per log, most relevant columns only.
pub fn write_log_table<W: Write>(
    writer: &mut W,
    logs: &[Log],
    labels: &Labels,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    if json {
        let views: Vec<LogView<'_>> = logs.iter().map(|log| LogView::new(log, now)).collect();
        return write_json(writer, &views);
    }

    if logs.is_empty() {
        writeln!(writer, "No logs.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<5}  {:<8}  {:>8}  {:<16}  Name",
        "ID", "State", "Total", "Last start"
    )?;
    for log in logs {
        let last_start = log
            .records
            .iter()
            .map(|record| record.start)
            .max()
            .map_or_else(|| "-".to_string(), format_time);
        let mut name = log.name.clone();
        if let Some(category_id) = log.category_id {
            name.push_str(&format!(" [{}]", labels.category(category_id)));
        }
        writeln!(
            writer,
            "{:<5}  {:<8}  {:>8}  {:<16}  {}",
            log.id,
            log.state().as_str(),
            format_duration(log.total_duration(now)),
            last_start,
            name
        )?;
    }
    Ok(())
}

/// Single record, as shown by `record` subcommands.
pub fn write_record<W: Write>(
    writer: &mut W,
    record: &Record,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    if json {
        return write_json(writer, record);
    }
    write!(writer, "Log {} ", record.log_id)?;
    write_record_line(writer, record, now)
}

fn write_record_line<W: Write>(writer: &mut W, record: &Record, now: DateTime<Utc>) -> Result<()> {
    let end = record.end.map_or_else(|| "running".to_string(), format_time);
    writeln!(
        writer,
        "record {}: {} -> {} ({})",
        record.id,
        format_time(record.start),
        end,
        format_duration(record.duration(now))
    )?;
    Ok(())
}
