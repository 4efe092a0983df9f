//! Log edits: patch, delete, split and merge.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use mt_core::{DynamicId, Field, LogPatch};
use mt_db::{CreateMissing, LogTarget, Tracker};

use super::Invocation;
use super::output::{Labels, LogView, write_json, write_log};
use super::util::{format_time, parse_meta};

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Log to change; defaults to the running log.
    #[arg(allow_negative_numbers = true)]
    pub id: Option<DynamicId>,

    /// Full or partial patch as a JSON object; the options below override it.
    #[arg(long, value_name = "JSON")]
    pub patch: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    /// Category name.
    #[arg(long, conflicts_with = "clear_category")]
    pub category: Option<String>,

    #[arg(long)]
    pub clear_category: bool,

    /// Task name.
    #[arg(long, conflicts_with = "clear_task")]
    pub task: Option<String>,

    #[arg(long)]
    pub clear_task: bool,

    /// Replace the flags with these (repeatable).
    #[arg(long = "flag", value_name = "FLAG", conflicts_with = "clear_flags")]
    pub flags: Vec<String>,

    /// Remove every flag.
    #[arg(long)]
    pub clear_flags: bool,

    #[arg(long, value_name = "BOOL")]
    pub stopped: Option<bool>,

    /// Replace the meta object.
    #[arg(long, value_name = "JSON", conflicts_with = "clear_meta")]
    pub meta: Option<String>,

    #[arg(long)]
    pub clear_meta: bool,

    /// Create the category if no category has that name.
    #[arg(long)]
    pub create_category: bool,

    /// Create the task if no task has that name.
    #[arg(long)]
    pub create_task: bool,
}

/// Picks the explicit value, the clear switch, or leaves the slot alone.
fn nullable<T>(value: Option<T>, clear: bool, current: Field<Option<T>>) -> Field<Option<T>> {
    match (value, clear) {
        (Some(value), _) => Field::Set(Some(value)),
        (None, true) => Field::Set(None),
        (None, false) => current,
    }
}

impl EditArgs {
    fn patch(&self) -> Result<LogPatch> {
        let mut patch: LogPatch = match &self.patch {
            Some(json) => serde_json::from_str(json).context("invalid --patch")?,
            None => LogPatch::default(),
        };

        if let Some(name) = &self.name {
            patch.name = Field::Set(name.clone());
        }
        if let Some(stopped) = self.stopped {
            patch.stopped = Field::Set(stopped);
        }
        patch.description = nullable(
            self.description.clone(),
            self.clear_description,
            patch.description,
        );
        patch.category = nullable(self.category.clone(), self.clear_category, patch.category);
        patch.task = nullable(self.task.clone(), self.clear_task, patch.task);
        let flags = (!self.flags.is_empty()).then(|| self.flags.clone());
        patch.flags = nullable(flags, self.clear_flags, patch.flags);
        let meta = self.meta.as_deref().map(parse_meta).transpose()?;
        patch.meta = nullable(meta, self.clear_meta, patch.meta);
        Ok(patch)
    }
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Log to delete; negative values count back from the most recent log.
    #[arg(allow_negative_numbers = true)]
    pub id: DynamicId,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Log to split at the request time (see --at and --shift).
    #[arg(allow_negative_numbers = true)]
    pub id: DynamicId,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Log that receives the records.
    pub id: i64,

    /// Log whose records are moved; it is deleted afterwards.
    pub with: i64,
}

#[derive(Serialize)]
struct SplitView<'a> {
    original: LogView<'a>,
    sibling: LogView<'a>,
}

pub fn edit<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &EditArgs,
    invocation: &Invocation,
) -> Result<()> {
    let target = args.id.map_or(LogTarget::Active, LogTarget::Dynamic);
    let create = CreateMissing {
        category: args.create_category,
        task: args.create_task,
    };
    let log = tracker
        .update_log(target, args.patch()?, create, invocation.at)
        .context("failed to update log")?;
    let labels = Labels::load(tracker)?;
    write_log(writer, &log, &labels, invocation.at, invocation.json)
}

pub fn delete<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &DeleteArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .delete_log(args.id)
        .with_context(|| format!("failed to delete log {}", args.id))?;
    if invocation.json {
        return write_json(writer, &LogView::new(&log, invocation.at));
    }
    writeln!(writer, "Deleted log {}: {}", log.id, log.name)?;
    Ok(())
}

pub fn split<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &SplitArgs,
    invocation: &Invocation,
) -> Result<()> {
    let (original, sibling) = tracker
        .split_log(args.id, invocation.at)
        .with_context(|| format!("failed to split log {}", args.id))?;
    if invocation.json {
        let view = SplitView {
            original: LogView::new(&original, invocation.at),
            sibling: LogView::new(&sibling, invocation.at),
        };
        return write_json(writer, &view);
    }
    writeln!(
        writer,
        "Split log {} at {}; later records moved to log {}",
        original.id,
        format_time(invocation.at),
        sibling.id
    )?;
    Ok(())
}

pub fn merge<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    args: &MergeArgs,
    invocation: &Invocation,
) -> Result<()> {
    let log = tracker
        .merge_logs(args.id, args.with)
        .with_context(|| format!("failed to merge log {} into {}", args.with, args.id))?;
    if !invocation.json {
        writeln!(writer, "Merged log {} into log {}", args.with, args.id)?;
    }
    let labels = Labels::load(tracker)?;
    write_log(writer, &log, &labels, invocation.at, invocation.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use mt_core::{LogState, NewLog};
    use mt_db::{ErrorKind, TrackError};

    use crate::commands::testing::{at, json, output, text, tracker};

    fn edit_args(id: Option<i64>) -> EditArgs {
        EditArgs {
            id: id.map(DynamicId::from),
            patch: None,
            name: None,
            description: None,
            clear_description: false,
            category: None,
            clear_category: false,
            task: None,
            clear_task: false,
            flags: Vec::new(),
            clear_flags: false,
            stopped: None,
            meta: None,
            clear_meta: false,
            create_category: false,
            create_task: false,
        }
    }

    fn start(tracker: &mut Tracker, name: &str, hour: u32) {
        tracker
            .start_log(
                &NewLog {
                    name: Some(name.to_string()),
                    flags: Some(vec!["billable".to_string()]),
                    ..NewLog::default()
                },
                CreateMissing::default(),
                at(hour, 0),
            )
            .unwrap();
    }

    #[test]
    fn edit_the_active_log() {
        let mut tracker = tracker();
        start(&mut tracker, "draft", 9);

        let mut args = edit_args(None);
        args.name = Some("final".to_string());
        args.task = Some("review".to_string());
        args.create_task = true;
        args.flags = vec!["urgent".to_string(), "billable".to_string()];
        args.description = Some("second pass".to_string());

        let mut out = Vec::new();
        edit(&mut out, &mut tracker, &args, &text(9, 30)).unwrap();
        assert_snapshot!(output(out), @r"
        Log 1: final (running)
          Task: review
          Flags: billable, urgent
          Description: second pass
          Records:
            record 1: 2025-01-06 09:00 -> running (30m)
          Total: 30m
        ");
    }

    #[test]
    fn edit_clears_fields_and_applies_a_json_patch() {
        let mut tracker = tracker();
        start(&mut tracker, "draft", 9);

        let mut args = edit_args(Some(-1));
        args.clear_flags = true;
        args.patch = Some(r#"{"name":"from json","description":"kept"}"#.to_string());
        args.name = Some("from flag".to_string());

        edit(&mut Vec::new(), &mut tracker, &args, &text(9, 30)).unwrap();
        let log = tracker.get_log(DynamicId::Literal(1)).unwrap();
        assert_eq!(log.name, "from flag");
        assert_eq!(log.description.as_deref(), Some("kept"));
        assert!(log.flags.is_empty());

        let mut args = edit_args(Some(1));
        args.clear_description = true;
        edit(&mut Vec::new(), &mut tracker, &args, &text(9, 30)).unwrap();
        let log = tracker.get_log(DynamicId::Literal(1)).unwrap();
        assert_eq!(log.description, None);
        assert_eq!(log.name, "from flag");
    }

    #[test]
    fn edit_adds_a_record_through_the_patch() {
        let mut tracker = tracker();
        start(&mut tracker, "a", 9);
        tracker.pause_active_log(at(10, 0)).unwrap();

        let mut args = edit_args(Some(1));
        args.patch = Some(
            r#"{"records":[{"start":"2025-01-06T07:00:00Z","end":"2025-01-06T08:00:00Z"}]}"#
                .to_string(),
        );
        let mut out = Vec::new();
        edit(&mut out, &mut tracker, &args, &json(11, 0)).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["records"].as_array().unwrap().len(), 2);
        assert_eq!(value["duration_seconds"], 7200);
    }

    #[test]
    fn edit_without_active_log_fails() {
        let mut tracker = tracker();
        let err = edit(&mut Vec::new(), &mut tracker, &edit_args(None), &text(9, 0)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackError>().unwrap().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn split_then_merge() {
        let mut tracker = tracker();
        start(&mut tracker, "long", 9);
        tracker.stop_active_log(at(12, 0)).unwrap();

        let mut out = Vec::new();
        let args = SplitArgs {
            id: DynamicId::Literal(1),
        };
        split(&mut out, &mut tracker, &args, &text(10, 0)).unwrap();
        assert_snapshot!(
            output(out),
            @"Split log 1 at 2025-01-06 10:00; later records moved to log 2"
        );

        let original = tracker.get_log(DynamicId::Literal(1)).unwrap();
        let sibling = tracker.get_log(DynamicId::Literal(2)).unwrap();
        assert_eq!(original.end(), Some(at(10, 0)));
        assert_eq!(sibling.start(), Some(at(10, 0)));
        assert_eq!(sibling.end(), Some(at(12, 0)));

        let mut out = Vec::new();
        let args = MergeArgs { id: 1, with: 2 };
        merge(&mut out, &mut tracker, &args, &text(13, 0)).unwrap();
        let merged = tracker.get_log(DynamicId::Literal(1)).unwrap();
        assert_eq!(merged.start(), Some(at(9, 0)));
        assert_eq!(merged.end(), Some(at(12, 0)));
        assert_eq!(merged.state(), LogState::Stopped);
        assert!(tracker.get_log(DynamicId::Literal(2)).is_err());
        assert!(output(out).starts_with("Merged log 2 into log 1\n"));
    }

    #[test]
    fn merge_with_itself_is_rejected() {
        let mut tracker = tracker();
        start(&mut tracker, "a", 9);
        let err = merge(
            &mut Vec::new(),
            &mut tracker,
            &MergeArgs { id: 1, with: 1 },
            &text(10, 0),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackError>().unwrap().kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn delete_by_negative_id() {
        let mut tracker = tracker();
        start(&mut tracker, "a", 9);
        start(&mut tracker, "b", 10);

        let mut out = Vec::new();
        let args = DeleteArgs {
            id: DynamicId::from(-1),
        };
        delete(&mut out, &mut tracker, &args, &text(11, 0)).unwrap();
        assert_snapshot!(output(out), @"Deleted log 2: b");
        assert_eq!(tracker.list_logs(&Default::default()).unwrap().len(), 1);
    }
}
