//! Log selection builder.
//!
//! A [`LogQuery`] accumulates conditions and orderings as plain values and
//! compiles them once into a single statement. The statement always left-joins
//! records and groups by log, so orderings may use the latest or earliest
//! record start.

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::TrackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Stopped,
    CategoryId,
    TaskId,
    Flag,
    RecordStart,
    RecordEnd,
}

impl Column {
    const fn sql(self) -> &'static str {
        match self {
            Self::Stopped => "logs.stopped",
            Self::CategoryId => "logs.category_id",
            Self::TaskId => "logs.task_id",
            Self::Flag => "log_flags.flag",
            Self::RecordStart => "records.start_at",
            Self::RecordEnd => "records.end_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Eq,
    Ge,
    Le,
}

impl Op {
    const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare(Column, Op, Value),
    In(Column, Vec<Value>),
    AnyOf(Vec<Condition>),
    /// The log owns no record with `end_at IS NULL`.
    NoOpenRecord,
}

impl Condition {
    fn render(&self, sql: &mut String, values: &mut Vec<Value>) {
        match self {
            Self::Compare(column, op, value) => {
                sql.push_str(column.sql());
                sql.push(' ');
                sql.push_str(op.sql());
                sql.push_str(" ?");
                values.push(value.clone());
            }
            Self::In(column, members) => {
                if members.is_empty() {
                    sql.push('0');
                    return;
                }
                sql.push_str(column.sql());
                sql.push_str(" IN (");
                sql.push_str(&vec!["?"; members.len()].join(", "));
                sql.push(')');
                values.extend(members.iter().cloned());
            }
            Self::AnyOf(conditions) => {
                if conditions.is_empty() {
                    sql.push('0');
                    return;
                }
                sql.push('(');
                for (index, condition) in conditions.iter().enumerate() {
                    if index > 0 {
                        sql.push_str(" OR ");
                    }
                    condition.render(sql, values);
                }
                sql.push(')');
            }
            Self::NoOpenRecord => sql.push_str(
                "NOT EXISTS (SELECT 1 FROM records AS o WHERE o.log_id = logs.id AND o.end_at IS NULL)",
            ),
        }
    }

    const fn needs_flags(&self) -> bool {
        matches!(
            self,
            Self::Compare(Column::Flag, ..) | Self::In(Column::Flag, _)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ordering {
    /// Latest record start first; logs without records last.
    LatestStartDesc,
    /// Earliest record start first; logs without records first.
    EarliestStartAsc,
    IdDesc,
    IdAsc,
}

impl Ordering {
    const fn sql(self) -> &'static str {
        match self {
            Self::LatestStartDesc => "MAX(records.start_at) DESC",
            Self::EarliestStartAsc => "MIN(records.start_at) ASC",
            Self::IdDesc => "logs.id DESC",
            Self::IdAsc => "logs.id ASC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LogQuery {
    conditions: Vec<Condition>,
    orderings: Vec<Ordering>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl LogQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Logs ordered by most recent activity, newest first.
    pub(crate) fn recent_first() -> Self {
        Self::new()
            .order_by(Ordering::LatestStartDesc)
            .order_by(Ordering::IdDesc)
    }

    /// Logs ordered by first activity, oldest first.
    pub(crate) fn oldest_first() -> Self {
        Self::new()
            .order_by(Ordering::EarliestStartAsc)
            .order_by(Ordering::IdAsc)
    }

    pub(crate) fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub(crate) fn eq(self, column: Column, value: impl Into<Value>) -> Self {
        self.filter(Condition::Compare(column, Op::Eq, value.into()))
    }

    pub(crate) fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub(crate) const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Builds the statement text and its positional parameters.
    pub(crate) fn compile(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT logs.id FROM logs");
        let mut values = Vec::new();

        if self.conditions.iter().any(Condition::needs_flags) {
            sql.push_str(" JOIN log_flags ON log_flags.log_id = logs.id");
        }
        sql.push_str(" LEFT JOIN records ON records.log_id = logs.id");

        for (index, condition) in self.conditions.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            condition.render(&mut sql, &mut values);
        }

        sql.push_str(" GROUP BY logs.id");

        if !self.orderings.is_empty() {
            let orderings: Vec<&str> = self.orderings.iter().map(|o| o.sql()).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orderings.join(", "));
        }

        if self.limit.is_some() || self.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            values.push(Value::Integer(self.limit.map_or(-1, to_sql_int)));
            values.push(Value::Integer(self.offset.map_or(0, to_sql_int)));
        }

        (sql, values)
    }

    /// Runs the query and returns matching log ids in order.
    pub(crate) fn ids(&self, conn: &Connection) -> Result<Vec<i64>, TrackError> {
        let (sql, values) = self.compile();
        tracing::trace!(%sql, "log query");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub(crate) fn first_id(self, conn: &Connection) -> Result<Option<i64>, TrackError> {
        Ok(self.limit(1).ids(conn)?.into_iter().next())
    }
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
