use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};
use tracing::debug;

use crate::engine::errors::EngineResult;
use crate::engine::query::aggregation::{AggregationQuery, AggregationResult, GroupKey};
use crate::engine::query::conditions::Conditions;
use crate::engine::query::page::Page;
use crate::engine::query::sort::SortingOrder;
use crate::shared::response::DbListResponse;

/// Plain row listing over `from` (aliased `t`).
#[derive(Debug, Clone)]
pub struct ListQuery<'a> {
    pub from: String,
    pub conditions: &'a Conditions,
    /// Code-owned sort column; ties are broken by `t.id`.
    pub order_by: &'a str,
    pub order: SortingOrder,
    pub page: Page,
}

/// Lists one page of rows plus the total match count.
///
/// A page size of zero skips the row query and only counts.
pub fn list<T>(
    conn: &Connection,
    query: &ListQuery<'_>,
    mut map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> EngineResult<DbListResponse<T>> {
    let where_sql = query.conditions.where_sql();
    let params = query.conditions.params();

    let records = if query.page.page_size == 0 {
        Vec::new()
    } else {
        let sql = format!(
            "SELECT t.* FROM {}{where_sql} ORDER BY {} {}, t.id ASC LIMIT ? OFFSET ?",
            query.from,
            query.order_by,
            query.order.sql()
        );
        debug!(target: "lens_db::query", sql = %sql, params = params.len(), "Listing rows");

        let mut bound = params.to_vec();
        bound.push(Value::Integer(query.page.limit()));
        bound.push(Value::Integer(query.page.offset()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bound.iter()), |row| map(row))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let count_sql = format!("SELECT COUNT(*) FROM {}{where_sql}", query.from);
    let total: i64 = conn.query_row(&count_sql, params_from_iter(params.iter()), |row| row.get(0))?;

    Ok(DbListResponse::of(records, total as usize))
}

/// Groups matching rows by the query key and applies its measure.
///
/// Pagination applies to buckets; `total_count` is the number of buckets.
pub fn group_by_and_calculate(
    conn: &Connection,
    query: &AggregationQuery,
) -> EngineResult<DbListResponse<AggregationResult>> {
    let grouped = query.grouped_sql();
    let params = query.conditions.params();

    let mut sql = format!("{grouped} {}", query.order_sql());
    let mut bound = params.to_vec();
    if let Some(page) = query.page {
        sql.push_str(" LIMIT ? OFFSET ?");
        bound.push(Value::Integer(page.limit()));
        bound.push(Value::Integer(page.offset()));
    }
    debug!(target: "lens_db::query", sql = %sql, params = bound.len(), "Executing group-by");

    let records = if query.page.is_some_and(|p| p.page_size == 0) {
        Vec::new()
    } else {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bound.iter()), |row| query.map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let total = match query.page {
        None => records.len(),
        Some(_) => {
            let count_sql = format!("SELECT COUNT(*) FROM ({grouped})");
            let n: i64 = conn.query_row(&count_sql, params_from_iter(params.iter()), |row| row.get(0))?;
            n as usize
        }
    };

    Ok(DbListResponse::of(records, total))
}

/// Group-by whose buckets each carry a nested breakdown by the next key in
/// `stacks`, recursively.
///
/// Every nested query re-runs the parent's filters narrowed to the parent
/// bucket, so the nested counts of a bucket add up to the bucket's own count.
pub fn stacked_group_by(
    conn: &Connection,
    query: &AggregationQuery,
    stacks: &[GroupKey],
) -> EngineResult<DbListResponse<AggregationResult>> {
    let mut outer = group_by_and_calculate(conn, query)?;
    let Some((next, rest)) = stacks.split_first() else {
        return Ok(outer);
    };

    for bucket in outer.records.iter_mut() {
        let inner = query.narrowed(&bucket.key, next);
        let nested = stacked_group_by(conn, &inner, rest)?;
        bucket.stacks = Some(nested.records);
    }

    debug!(
        target: "lens_db::query",
        buckets = outer.records.len(),
        depth = stacks.len(),
        "Stacked group-by complete"
    );
    Ok(outer)
}
