//! CLI subcommand implementations.

pub mod catalog;
pub mod edit;
pub mod lifecycle;
pub mod logs;
pub mod output;
pub mod record;
pub mod util;

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use mt_db::Tracker;

use crate::Commands;
use catalog::Catalog;

/// Settings shared by every command of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    /// The resolved request time; mutations happen at this instant.
    pub at: DateTime<Utc>,
    /// Print JSON instead of text.
    pub json: bool,
}

/// Runs one subcommand against an open tracker.
pub fn dispatch<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    command: &Commands,
    invocation: &Invocation,
) -> Result<()> {
    match command {
        Commands::Start(args) => lifecycle::start(writer, tracker, args, invocation),
        Commands::Next(args) => lifecycle::next(writer, tracker, args, invocation),
        Commands::Stop(args) => lifecycle::stop(writer, tracker, args, invocation),
        Commands::Pause(args) => lifecycle::pause(writer, tracker, args, invocation),
        Commands::Resume(args) => lifecycle::resume(writer, tracker, args, invocation),
        Commands::Active => logs::active(writer, tracker, invocation),
        Commands::Show(args) => logs::show(writer, tracker, args, invocation),
        Commands::List(args) => logs::list(writer, tracker, args, invocation),
        Commands::Edit(args) => edit::edit(writer, tracker, args, invocation),
        Commands::Delete(args) => edit::delete(writer, tracker, args, invocation),
        Commands::Split(args) => edit::split(writer, tracker, args, invocation),
        Commands::Merge(args) => edit::merge(writer, tracker, args, invocation),
        Commands::Task { action } => {
            catalog::run(writer, tracker, Catalog::Tasks, action, invocation)
        }
        Commands::Category { action } => {
            catalog::run(writer, tracker, Catalog::Categories, action, invocation)
        }
        Commands::Record { action } => record::run(writer, tracker, action, invocation),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, TimeZone, Utc};

    use mt_db::{Tracker, TrackerOptions};

    use super::Invocation;

    pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, minute, 0).unwrap()
    }

    pub fn text(hour: u32, minute: u32) -> Invocation {
        Invocation {
            at: at(hour, minute),
            json: false,
        }
    }

    pub fn json(hour: u32, minute: u32) -> Invocation {
        Invocation {
            at: at(hour, minute),
            json: true,
        }
    }

    pub fn tracker() -> Tracker {
        Tracker::open_in_memory(TrackerOptions::default()).unwrap()
    }

    pub fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }
}
