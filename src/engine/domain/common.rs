use rusqlite::params_from_iter;
use std::fmt;

use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::query::sort::{SortMap, first_sort};
use crate::engine::query::{
    AggregationQuery, Conditions, GroupKey, GroupSort, Measure, Page, QueryLimits, SortingOrder,
};
use crate::engine::store::{Database, Tenant};
use crate::shared::datetime::AggInterval;

/// Closed set of across dimensions a domain can group by.
pub trait Dimension: Copy + PartialEq + fmt::Debug {
    fn name(&self) -> &'static str;

    fn group_key(&self, interval: AggInterval) -> GroupKey;

    fn is_trend(&self) -> bool {
        false
    }
}

/// Closed set of calculations a domain supports.
pub trait Calculation: Copy + PartialEq + fmt::Debug {
    fn name(&self) -> &'static str;

    fn measure(&self) -> Measure;
}

/// The grouping part of a domain filter.
pub struct GroupRequest<'a, D, C> {
    pub across: Option<D>,
    pub stacks: &'a [D],
    pub calculation: C,
    pub interval: Option<AggInterval>,
    pub sort: &'a SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl<D: Dimension, C: Calculation> GroupRequest<'_, D, C> {
    pub fn across(&self) -> EngineResult<D> {
        self.across
            .ok_or_else(|| EngineError::validation("Missing or invalid across field"))
    }

    pub fn interval(&self) -> AggInterval {
        self.interval.unwrap_or_default()
    }

    pub fn build(&self, from: String, conditions: Conditions, limits: QueryLimits) -> EngineResult<AggregationQuery> {
        let across = self.across()?;
        let key = across.group_key(self.interval());
        let sort = GroupSort::resolve(self.sort, across.name(), self.calculation.name(), &key)?;
        Ok(
            AggregationQuery::new(from, conditions, key, self.calculation.measure())
                .with_sort(sort)
                .with_page(Page::optional(self.page, self.page_size, limits)),
        )
    }

    /// Nested group keys, outermost first. Repeating a dimension is rejected.
    pub fn stack_keys(&self) -> EngineResult<Vec<GroupKey>> {
        let across = self.across()?;
        let mut seen = vec![across];
        let mut keys = Vec::with_capacity(self.stacks.len());
        for stack in self.stacks {
            if seen.contains(stack) {
                return Err(EngineError::validation(format!(
                    "Stack dimension {} repeats an outer dimension",
                    stack.name()
                )));
            }
            seen.push(*stack);
            keys.push(stack.group_key(self.interval()));
        }
        Ok(keys)
    }
}

/// Maps the first sort entry onto a whitelisted column; unknown fields fall
/// back to the domain default.
pub fn list_sort(
    sort: &SortMap,
    columns: &[(&str, &'static str)],
    default: (&'static str, SortingOrder),
) -> (&'static str, SortingOrder) {
    first_sort(sort)
        .and_then(|(field, order)| {
            columns
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, column)| (*column, order))
        })
        .unwrap_or(default)
}

pub fn delete_by_id(db: &Database, tenant: &Tenant, table: &str, id: &str) -> EngineResult<bool> {
    let table = tenant.table(table);
    let deleted = db.with_tenant(tenant, |conn| {
        Ok(conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?)
    })?;
    Ok(deleted > 0)
}

pub fn bulk_delete(db: &Database, tenant: &Tenant, table: &str, ids: &[String]) -> EngineResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let table = tenant.table(table);
    let placeholders = vec!["?"; ids.len()].join(", ");
    db.with_tenant(tenant, |conn| {
        Ok(conn.execute(
            &format!("DELETE FROM {table} WHERE id IN ({placeholders})"),
            params_from_iter(ids.iter()),
        )?)
    })
}

/// Pins snapshot tables to one ingestion: the given `ingested_at`, or the
/// latest one of each integration.
pub fn snapshot(conditions: &mut Conditions, table: &str, ingested_at: Option<i64>) {
    match ingested_at {
        Some(ts) => {
            conditions.eq("t.ingested_at", ts);
        }
        None => {
            let table = conditions.tenant().table(table);
            conditions.push(
                format!(
                    "t.ingested_at = (SELECT MAX(l.ingested_at) FROM {table} AS l \
                     WHERE l.integration_id = t.integration_id)"
                ),
                std::iter::empty(),
            );
        }
    }
}
