use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::query::conditions::Conditions;
use crate::engine::query::page::Page;
use crate::engine::query::sort::{SortMap, SortingOrder, first_sort};
use crate::shared::datetime::AggInterval;

pub const UNASSIGNED: &str = "_UNASSIGNED_";
pub const UNKNOWN_USER: &str = "_UNKNOWN_";
pub const UNKNOWN: &str = "UNKNOWN";

/// One bucket of a group-by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tickets: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacks: Option<Vec<AggregationResult>>,
}

impl AggregationResult {
    /// Row count backing the bucket, whichever measure produced it.
    pub fn weight(&self) -> i64 {
        self.count.or(self.total_tickets).unwrap_or(0)
    }
}

/// Across dimension rendered as SQL.
///
/// Keys are always text: column values are cast and null/empty values collapse
/// into the sentinel; interval keys are the bucket start in epoch seconds,
/// except `day_of_week` whose key is the weekday name.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    Column { expr: String, sentinel: &'static str },
    Interval { column: String, interval: AggInterval },
}

impl GroupKey {
    pub fn column(expr: impl Into<String>, sentinel: &'static str) -> Self {
        GroupKey::Column {
            expr: expr.into(),
            sentinel,
        }
    }

    pub fn interval(column: impl Into<String>, interval: AggInterval) -> Self {
        GroupKey::Interval {
            column: column.into(),
            interval,
        }
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, GroupKey::Interval { .. })
    }

    pub fn key_sql(&self) -> String {
        match self {
            GroupKey::Column { expr, sentinel } => {
                format!("COALESCE(NULLIF(CAST({expr} AS TEXT), ''), '{sentinel}')")
            }
            GroupKey::Interval { column, interval } if interval.is_cyclic() => {
                format!("COALESCE(interval_label({column}, '{interval}'), '{UNKNOWN}')")
            }
            GroupKey::Interval { column, interval } => format!(
                "COALESCE(CAST(interval_start({column}, '{interval}') AS TEXT), '{UNKNOWN}')"
            ),
        }
    }

    fn is_cyclic(&self) -> bool {
        matches!(self, GroupKey::Interval { interval, .. } if interval.is_cyclic())
    }

    fn label_sql(&self) -> String {
        match self {
            GroupKey::Column { .. } => "NULL".to_string(),
            GroupKey::Interval { column, interval } => {
                format!("interval_label({column}, '{interval}')")
            }
        }
    }

    fn order_sql(&self) -> String {
        match self {
            GroupKey::Column { .. } => self.key_sql(),
            GroupKey::Interval { column, interval } => {
                format!("interval_order({column}, '{interval}')")
            }
        }
    }
}

/// Calculation applied per bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    /// `count`
    Count,
    /// `total_tickets`
    Tickets,
    /// `min`/`max`/`median`/`count` over the non-null values of `expr`
    Stats { expr: String },
    /// `sum`/`count`
    Sum { expr: String },
}

impl Measure {
    pub fn stats(expr: impl Into<String>) -> Self {
        Measure::Stats { expr: expr.into() }
    }

    pub fn sum(expr: impl Into<String>) -> Self {
        Measure::Sum { expr: expr.into() }
    }

    fn value_sql(&self) -> Option<&str> {
        match self {
            Measure::Count | Measure::Tickets => None,
            Measure::Stats { expr } | Measure::Sum { expr } => Some(expr),
        }
    }

    fn select_sql(&self) -> &'static str {
        match self {
            Measure::Count => "COUNT(*) AS agg_count",
            Measure::Tickets => "COUNT(*) AS agg_total_tickets",
            Measure::Stats { .. } => {
                "MIN(agg_value) AS agg_min, MAX(agg_value) AS agg_max, \
                 median(agg_value) AS agg_median, COUNT(agg_value) AS agg_count"
            }
            Measure::Sum { .. } => "SUM(agg_value) AS agg_sum, COUNT(*) AS agg_count",
        }
    }

    /// Column the value sort applies to. Stats buckets rank by their
    /// largest value, so the slowest bucket comes first under DESC.
    fn sort_column(&self) -> &'static str {
        match self {
            Measure::Count => "agg_count",
            Measure::Tickets => "agg_total_tickets",
            Measure::Stats { .. } => "agg_max",
            Measure::Sum { .. } => "agg_sum",
        }
    }

    fn map_row(&self, row: &Row<'_>) -> rusqlite::Result<AggregationResult> {
        let mut result = AggregationResult {
            key: row.get("agg_key")?,
            additional_key: row.get("agg_additional_key")?,
            ..AggregationResult::default()
        };
        match self {
            Measure::Count => {
                result.count = Some(row.get("agg_count")?);
            }
            Measure::Tickets => {
                result.total_tickets = Some(row.get("agg_total_tickets")?);
            }
            Measure::Stats { .. } => {
                result.min = row.get("agg_min")?;
                result.max = row.get("agg_max")?;
                result.median = row.get("agg_median")?;
                result.count = Some(row.get("agg_count")?);
            }
            Measure::Sum { .. } => {
                result.sum = row.get("agg_sum")?;
                result.count = Some(row.get("agg_count")?);
            }
        }
        Ok(result)
    }
}

/// Keeps only the latest snapshot of each entity per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDedup {
    /// Bucket the snapshots are deduplicated within.
    pub bucket: String,
    /// Columns identifying one entity.
    pub partition: Vec<String>,
    /// Newest row wins.
    pub latest_by: String,
}

impl SnapshotDedup {
    fn rank_sql(&self) -> String {
        let mut partition = vec![self.bucket.clone()];
        partition.extend(self.partition.iter().cloned());
        format!(
            "ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {} DESC)",
            partition.join(", "),
            self.latest_by
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTarget {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSort {
    pub target: SortTarget,
    pub order: SortingOrder,
}

impl GroupSort {
    /// Interval buckets newest first, weekdays Monday first, everything
    /// else largest first.
    pub fn default_for(key: &GroupKey) -> Self {
        if key.is_cyclic() {
            return Self {
                target: SortTarget::Key,
                order: SortingOrder::Asc,
            };
        }
        let target = if key.is_interval() {
            SortTarget::Key
        } else {
            SortTarget::Value
        };
        Self {
            target,
            order: SortingOrder::Desc,
        }
    }

    /// Resolves the first sort entry, which must name the across dimension
    /// or the calculation.
    pub fn resolve(sort: &SortMap, across: &str, calculation: &str, key: &GroupKey) -> EngineResult<Self> {
        match first_sort(sort) {
            None => Ok(Self::default_for(key)),
            Some((field, order)) if field == across => Ok(Self {
                target: SortTarget::Key,
                order,
            }),
            Some((field, order)) if field == calculation => Ok(Self {
                target: SortTarget::Value,
                order,
            }),
            Some((field, _)) => Err(EngineError::validation(format!("Invalid sort field {field}"))),
        }
    }
}

/// A fully resolved group-by: where rows come from, how they are filtered,
/// bucketed, measured, sorted and paged.
#[derive(Debug, Clone)]
pub struct AggregationQuery {
    /// FROM target, aliased `t`.
    pub from: String,
    pub conditions: Conditions,
    pub key: GroupKey,
    pub measure: Measure,
    pub dedup: Option<SnapshotDedup>,
    pub sort: GroupSort,
    pub page: Option<Page>,
}

impl AggregationQuery {
    pub fn new(from: impl Into<String>, conditions: Conditions, key: GroupKey, measure: Measure) -> Self {
        let sort = GroupSort::default_for(&key);
        Self {
            from: from.into(),
            conditions,
            key,
            measure,
            dedup: None,
            sort,
            page: None,
        }
    }

    pub fn with_dedup(mut self, dedup: Option<SnapshotDedup>) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_sort(mut self, sort: GroupSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: Option<Page>) -> Self {
        self.page = page;
        self
    }

    /// Narrows to one bucket of the current key and regroups by `next`.
    pub fn narrowed(&self, bucket_key: &str, next: &GroupKey) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.push(
            format!("{} = ?", self.key.key_sql()),
            [rusqlite::types::Value::Text(bucket_key.to_string())],
        );
        Self {
            from: self.from.clone(),
            conditions,
            key: next.clone(),
            measure: self.measure.clone(),
            dedup: self.dedup.clone(),
            sort: GroupSort::default_for(next),
            page: None,
        }
    }

    /// Per-row projection the buckets are computed from.
    pub(crate) fn base_sql(&self) -> String {
        let mut select = format!(
            "SELECT {} AS agg_key, {} AS agg_additional_key, {} AS agg_order",
            self.key.key_sql(),
            self.key.label_sql(),
            self.key.order_sql()
        );
        if let Some(value) = self.measure.value_sql() {
            select.push_str(&format!(", {value} AS agg_value"));
        }
        if let Some(dedup) = &self.dedup {
            select.push_str(&format!(", {} AS agg_rank", dedup.rank_sql()));
        }
        format!("{select} FROM {}{}", self.from, self.conditions.where_sql())
    }

    /// One row per bucket, unordered.
    pub(crate) fn grouped_sql(&self) -> String {
        let rank_filter = if self.dedup.is_some() {
            " WHERE agg_rank = 1"
        } else {
            ""
        };
        format!(
            "SELECT agg_key, MAX(agg_additional_key) AS agg_additional_key, MIN(agg_order) AS agg_order, {} \
             FROM ({}){rank_filter} GROUP BY agg_key",
            self.measure.select_sql(),
            self.base_sql()
        )
    }

    pub(crate) fn order_sql(&self) -> String {
        let column = match self.sort.target {
            SortTarget::Key => "agg_order",
            SortTarget::Value => self.measure.sort_column(),
        };
        format!("ORDER BY {column} {}, agg_key ASC", self.sort.order.sql())
    }

    pub(crate) fn map_row(&self, row: &Row<'_>) -> rusqlite::Result<AggregationResult> {
        self.measure.map_row(row)
    }
}
