//! Core domain logic for the metasking activity tracker.
//!
//! This crate contains the storage-independent pieces:
//! - Model: tasks, categories, logs and their records
//! - Patches: explicit partial updates with set/unset fields
//! - Filters and signed "dynamic" log references
//! - Interval planning for splitting and merging logs
//! - The request-time source

pub mod dynamic;
pub mod filter;
pub mod interval;
pub mod model;
pub mod patch;
pub mod time;
pub mod types;

pub use dynamic::DynamicId;
pub use filter::{LogFilter, SortOrder};
pub use interval::{MergedFields, SplitPlan, merge_fields, plan_split};
pub use model::{
    Category, LabelDraft, Log, LogDraft, Meta, NewLog, NewRecord, Record, Task, normalize_flags,
};
pub use patch::{Field, LabelPatch, LogChange, LogPatch, RecordPatch, RecordUpdate};
pub use time::{Clock, FixedClock, RequestTime, SystemClock};
pub use types::{LogState, ValidationError};
