//! Single-record commands.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;

use mt_core::{Field, NewRecord, RecordUpdate};
use mt_db::Tracker;

use super::Invocation;
use super::output::{Labels, write_json, write_log, write_record};
use super::util::{parse_datetime, parse_meta};

#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// Show a record.
    Show {
        id: i64,

        /// Show the owning log instead.
        #[arg(long)]
        log: bool,
    },

    /// Add a record to a log.
    Add {
        log_id: i64,

        /// Defaults to the request time.
        #[arg(long, value_name = "TIME")]
        start: Option<String>,

        /// Leave unset to open the record.
        #[arg(long, value_name = "TIME")]
        end: Option<String>,

        #[arg(long, value_name = "JSON")]
        meta: Option<String>,
    },

    /// Change a record's times, meta or owning log.
    Update {
        id: i64,

        /// Move the record to this log.
        #[arg(long = "log", value_name = "ID")]
        log_id: Option<i64>,

        #[arg(long, value_name = "TIME")]
        start: Option<String>,

        #[arg(long, value_name = "TIME", conflicts_with = "reopen")]
        end: Option<String>,

        /// Clear the end so the record runs again.
        #[arg(long)]
        reopen: bool,

        #[arg(long, value_name = "JSON", conflicts_with = "clear_meta")]
        meta: Option<String>,

        #[arg(long)]
        clear_meta: bool,
    },

    /// Delete a record; a log left without records is deleted too.
    Delete { id: i64 },
}

pub fn run<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    command: &RecordCommand,
    invocation: &Invocation,
) -> Result<()> {
    let now = invocation.at;
    match command {
        RecordCommand::Show { id, log: false } => {
            let record = tracker
                .get_record(*id)
                .with_context(|| format!("failed to load record {id}"))?;
            write_record(writer, &record, now, invocation.json)
        }
        RecordCommand::Show { id, log: true } => {
            let log = tracker
                .record_log(*id)
                .with_context(|| format!("failed to load the log of record {id}"))?;
            let labels = Labels::load(tracker)?;
            write_log(writer, &log, &labels, now, invocation.json)
        }
        RecordCommand::Add {
            log_id,
            start,
            end,
            meta,
        } => {
            let new = NewRecord {
                meta: meta.as_deref().map(parse_meta).transpose()?,
                start: start
                    .as_deref()
                    .map_or(Ok(now), |s| parse_datetime(s, now))
                    .context("invalid --start")?,
                end: end
                    .as_deref()
                    .map(|s| parse_datetime(s, now))
                    .transpose()
                    .context("invalid --end")?,
            };
            let record = tracker
                .create_record(*log_id, &new)
                .with_context(|| format!("failed to add a record to log {log_id}"))?;
            write_record(writer, &record, now, invocation.json)
        }
        RecordCommand::Update {
            id,
            log_id,
            start,
            end,
            reopen,
            meta,
            clear_meta,
        } => {
            let mut update = RecordUpdate {
                log_id: log_id.map_or(Field::Unset, Field::Set),
                ..RecordUpdate::default()
            };
            if let Some(start) = start {
                update.start = Field::Set(parse_datetime(start, now).context("invalid --start")?);
            }
            if let Some(end) = end {
                update.end = Field::Set(Some(parse_datetime(end, now).context("invalid --end")?));
            } else if *reopen {
                update.end = Field::Set(None);
            }
            if let Some(meta) = meta {
                update.meta = Field::Set(Some(parse_meta(meta)?));
            } else if *clear_meta {
                update.meta = Field::Set(None);
            }
            let record = tracker
                .update_record(*id, update)
                .with_context(|| format!("failed to update record {id}"))?;
            write_record(writer, &record, now, invocation.json)
        }
        RecordCommand::Delete { id } => {
            let record = tracker
                .delete_record(*id)
                .with_context(|| format!("failed to delete record {id}"))?;
            if invocation.json {
                return write_json(writer, &record);
            }
            writeln!(writer, "Deleted record {} of log {}", record.id, record.log_id)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use mt_core::{DynamicId, NewLog};
    use mt_db::{CreateMissing, ErrorKind, TrackError};

    use crate::commands::testing::{at, json, output, text, tracker};

    fn started(name: &str, hour: u32) -> Tracker {
        let mut tracker = tracker();
        tracker
            .start_log(
                &NewLog {
                    name: Some(name.to_string()),
                    ..NewLog::default()
                },
                CreateMissing::default(),
                at(hour, 0),
            )
            .unwrap();
        tracker
    }

    fn update(id: i64, end: Option<&str>, reopen: bool) -> RecordCommand {
        RecordCommand::Update {
            id,
            log_id: None,
            start: None,
            end: end.map(str::to_string),
            reopen,
            meta: None,
            clear_meta: false,
        }
    }

    #[test]
    fn show_record_and_its_log() {
        let mut tracker = started("a", 9);
        let mut out = Vec::new();
        let show = RecordCommand::Show { id: 1, log: false };
        run(&mut out, &mut tracker, &show, &text(9, 20)).unwrap();
        let show_log = RecordCommand::Show { id: 1, log: true };
        run(&mut out, &mut tracker, &show_log, &text(9, 20)).unwrap();

        assert_snapshot!(output(out), @r"
        Log 1 record 1: 2025-01-06 09:00 -> running (20m)
        Log 1: a (running)
          Records:
            record 1: 2025-01-06 09:00 -> running (20m)
          Total: 20m
        ");
    }

    #[test]
    fn add_closed_record_while_another_is_open() {
        let mut tracker = started("a", 9);
        let mut out = Vec::new();
        let add = RecordCommand::Add {
            log_id: 1,
            start: Some("2025-01-06T07:00:00Z".to_string()),
            end: Some("2025-01-06T08:00:00Z".to_string()),
            meta: Some(r#"{"source":"import"}"#.to_string()),
        };
        run(&mut out, &mut tracker, &add, &json(10, 0)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["meta"]["source"], "import");

        let open = RecordCommand::Add {
            log_id: 1,
            start: Some("1 hour ago".to_string()),
            end: None,
            meta: None,
        };
        let err = run(&mut Vec::new(), &mut tracker, &open, &text(10, 0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackError>(),
            Some(TrackError::AnotherRecordOpen { open_record_id: 1 })
        ));
    }

    #[test]
    fn update_rejects_end_before_start() {
        let mut tracker = started("a", 9);
        let command = update(1, Some("2025-01-06T08:00:00Z"), false);
        let err = run(&mut Vec::new(), &mut tracker, &command, &text(10, 0)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackError>().unwrap().kind(),
            ErrorKind::InvalidTime
        );
    }

    #[test]
    fn close_then_reopen() {
        let mut tracker = started("a", 9);
        let close = update(1, Some("now"), false);
        let mut out = Vec::new();
        run(&mut out, &mut tracker, &close, &text(10, 0)).unwrap();
        assert_snapshot!(
            output(out),
            @"Log 1 record 1: 2025-01-06 09:00 -> 2025-01-06 10:00 (1h 0m)"
        );

        let reopen = update(1, None, true);
        run(&mut Vec::new(), &mut tracker, &reopen, &text(10, 30)).unwrap();
        assert!(tracker.get_record(1).unwrap().is_open());
        assert_eq!(tracker.get_active_log().unwrap().id, 1);
    }

    #[test]
    fn deleting_the_last_record_deletes_the_log() {
        let mut tracker = started("a", 9);
        let mut out = Vec::new();
        run(&mut out, &mut tracker, &RecordCommand::Delete { id: 1 }, &text(10, 0)).unwrap();
        assert_snapshot!(output(out), @"Deleted record 1 of log 1");
        assert!(tracker.get_log(DynamicId::Literal(1)).is_err());
    }

    #[test]
    fn move_record_to_another_log() {
        let mut tracker = started("a", 9);
        tracker
            .start_log(
                &NewLog {
                    name: Some("b".to_string()),
                    ..NewLog::default()
                },
                CreateMissing::default(),
                at(10, 0),
            )
            .unwrap();

        let command = RecordCommand::Update {
            id: 1,
            log_id: Some(2),
            start: None,
            end: None,
            reopen: false,
            meta: None,
            clear_meta: false,
        };
        run(&mut Vec::new(), &mut tracker, &command, &text(11, 0)).unwrap();
        assert_eq!(tracker.get_record(1).unwrap().log_id, 2);
    }
}
