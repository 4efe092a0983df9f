//! Task and category management.
//!
//! Both catalogs share one set of subcommands; [`Catalog`] picks which
//! table they act on.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use mt_core::{Category, Field, LabelDraft, LabelPatch, Task};
use mt_db::{TrackError, Tracker};

use super::Invocation;
use super::output::write_json;

#[derive(Debug, Subcommand)]
pub enum LabelCommand {
    /// List every entry by name.
    List,

    /// Add an entry.
    Add {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Show an entry by id or name.
    Show { key: String },

    /// Rename an entry or change its description.
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,
    },

    /// Delete an entry; logs referring to it keep no label.
    Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Tasks,
    Categories,
}

/// A task or category, as printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<Task> for Label {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            description: task.description,
        }
    }
}

impl From<Category> for Label {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
        }
    }
}

impl Catalog {
    const fn noun(self) -> &'static str {
        match self {
            Self::Tasks => "task",
            Self::Categories => "category",
        }
    }

    fn list(self, tracker: &Tracker) -> Result<Vec<Label>, TrackError> {
        Ok(match self {
            Self::Tasks => tracker.list_tasks()?.into_iter().map(Label::from).collect(),
            Self::Categories => tracker
                .list_categories()?
                .into_iter()
                .map(Label::from)
                .collect(),
        })
    }

    fn get(self, tracker: &Tracker, key: &str) -> Result<Label, TrackError> {
        match (self, key.parse::<i64>()) {
            (Self::Tasks, Ok(id)) => tracker.get_task(id).map(Label::from),
            (Self::Tasks, Err(_)) => tracker.get_task_by_name(key).map(Label::from),
            (Self::Categories, Ok(id)) => tracker.get_category(id).map(Label::from),
            (Self::Categories, Err(_)) => tracker.get_category_by_name(key).map(Label::from),
        }
    }

    fn create(self, tracker: &mut Tracker, draft: &LabelDraft) -> Result<Label, TrackError> {
        match self {
            Self::Tasks => tracker.create_task(draft).map(Label::from),
            Self::Categories => tracker.create_category(draft).map(Label::from),
        }
    }

    fn update(self, tracker: &mut Tracker, id: i64, patch: LabelPatch) -> Result<Label, TrackError> {
        match self {
            Self::Tasks => tracker.update_task(id, patch).map(Label::from),
            Self::Categories => tracker.update_category(id, patch).map(Label::from),
        }
    }

    fn delete(self, tracker: &mut Tracker, id: i64) -> Result<Label, TrackError> {
        match self {
            Self::Tasks => tracker.delete_task(id).map(Label::from),
            Self::Categories => tracker.delete_category(id).map(Label::from),
        }
    }
}

fn write_label<W: Write>(writer: &mut W, label: &Label, json: bool) -> Result<()> {
    if json {
        return write_json(writer, label);
    }
    match &label.description {
        Some(description) => writeln!(writer, "{}: {} - {description}", label.id, label.name)?,
        None => writeln!(writer, "{}: {}", label.id, label.name)?,
    }
    Ok(())
}

pub fn run<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    catalog: Catalog,
    command: &LabelCommand,
    invocation: &Invocation,
) -> Result<()> {
    let noun = catalog.noun();
    match command {
        LabelCommand::List => {
            let labels = catalog
                .list(tracker)
                .with_context(|| format!("failed to list {noun} entries"))?;
            if invocation.json {
                return write_json(writer, &labels);
            }
            if labels.is_empty() {
                writeln!(writer, "No {noun} entries.")?;
            }
            for label in &labels {
                write_label(writer, label, false)?;
            }
            Ok(())
        }
        LabelCommand::Add { name, description } => {
            let draft = LabelDraft {
                name: name.clone(),
                description: description.clone(),
            };
            let label = catalog
                .create(tracker, &draft)
                .with_context(|| format!("failed to add {noun} {name:?}"))?;
            write_label(writer, &label, invocation.json)
        }
        LabelCommand::Show { key } => {
            let label = catalog
                .get(tracker, key)
                .with_context(|| format!("failed to find {noun} {key}"))?;
            write_label(writer, &label, invocation.json)
        }
        LabelCommand::Update {
            id,
            name,
            description,
            clear_description,
        } => {
            let patch = LabelPatch {
                name: name.clone().map_or(Field::Unset, Field::Set),
                description: match (description, clear_description) {
                    (Some(description), _) => Field::Set(Some(description.clone())),
                    (None, true) => Field::Set(None),
                    (None, false) => Field::Unset,
                },
            };
            let label = catalog
                .update(tracker, *id, patch)
                .with_context(|| format!("failed to update {noun} {id}"))?;
            write_label(writer, &label, invocation.json)
        }
        LabelCommand::Delete { id } => {
            let label = catalog
                .delete(tracker, *id)
                .with_context(|| format!("failed to delete {noun} {id}"))?;
            if invocation.json {
                return write_json(writer, &label);
            }
            writeln!(writer, "Deleted {noun} {}: {}", label.id, label.name)?;
            Ok(())
        }
    }
}
