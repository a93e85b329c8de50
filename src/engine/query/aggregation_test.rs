use indexmap::IndexMap;
use rusqlite::types::Value;

use super::aggregation::{
    AggregationQuery, AggregationResult, GroupKey, GroupSort, Measure, SnapshotDedup, SortTarget, UNKNOWN,
};
use super::conditions::Conditions;
use super::sort::SortingOrder;
use crate::engine::errors::EngineError;
use crate::engine::store::Tenant;
use crate::shared::datetime::AggInterval;

fn query(key: GroupKey, measure: Measure) -> AggregationQuery {
    let tenant = Tenant::parse("acme").unwrap();
    AggregationQuery::new("\"acme\".builds AS t", Conditions::new(&tenant), key, measure)
}

#[test]
fn column_keys_collapse_null_and_empty_into_sentinel() {
    let key = GroupKey::column("t.status", UNKNOWN);
    assert_eq!(
        key.key_sql(),
        "COALESCE(NULLIF(CAST(t.status AS TEXT), ''), 'UNKNOWN')"
    );
    assert!(!key.is_interval());
}

#[test]
fn interval_keys_use_bucket_start() {
    let key = GroupKey::interval("t.started_at", AggInterval::Week);
    assert_eq!(
        key.key_sql(),
        "COALESCE(CAST(interval_start(t.started_at, 'week') AS TEXT), 'UNKNOWN')"
    );
    assert!(key.is_interval());
}

#[test]
fn day_of_week_keys_are_weekday_names_sorted_monday_first() {
    let key = GroupKey::interval("t.started_at", AggInterval::DayOfWeek);
    assert_eq!(
        key.key_sql(),
        "COALESCE(interval_label(t.started_at, 'day_of_week'), 'UNKNOWN')"
    );

    let sort = GroupSort::default_for(&key);
    assert_eq!(sort.target, SortTarget::Key);
    assert_eq!(sort.order, SortingOrder::Asc);
}

#[test]
fn default_sort_is_newest_bucket_for_trends_and_biggest_otherwise() {
    let trend = GroupSort::default_for(&GroupKey::interval("t.ts", AggInterval::Day));
    assert_eq!(trend.target, SortTarget::Key);
    assert_eq!(trend.order, SortingOrder::Desc);

    let column = GroupSort::default_for(&GroupKey::column("t.status", UNKNOWN));
    assert_eq!(column.target, SortTarget::Value);
}

#[test]
fn sort_resolves_against_across_or_calculation() {
    let key = GroupKey::column("t.status", UNKNOWN);

    let mut sort = IndexMap::new();
    sort.insert("status".to_string(), SortingOrder::Asc);
    let resolved = GroupSort::resolve(&sort, "status", "build_count", &key).unwrap();
    assert_eq!(resolved.target, SortTarget::Key);
    assert_eq!(resolved.order, SortingOrder::Asc);

    let mut sort = IndexMap::new();
    sort.insert("build_count".to_string(), SortingOrder::Asc);
    let resolved = GroupSort::resolve(&sort, "status", "build_count", &key).unwrap();
    assert_eq!(resolved.target, SortTarget::Value);

    let mut sort = IndexMap::new();
    sort.insert("region".to_string(), SortingOrder::Asc);
    let err = GroupSort::resolve(&sort, "status", "build_count", &key).unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("region")));
}

#[test]
fn order_sql_targets_measure_column() {
    let q = query(GroupKey::column("t.status", UNKNOWN), Measure::stats("t.duration"));
    assert_eq!(q.order_sql(), "ORDER BY agg_max DESC, agg_key ASC");

    let q = query(GroupKey::interval("t.ts", AggInterval::Month), Measure::Count);
    assert_eq!(q.order_sql(), "ORDER BY agg_order DESC, agg_key ASC");
}

#[test]
fn dedup_ranks_within_bucket_and_keeps_first() {
    let key = GroupKey::interval("t.ingested_at", AggInterval::Week);
    let q = query(key.clone(), Measure::Tickets).with_dedup(Some(SnapshotDedup {
        bucket: key.key_sql(),
        partition: vec!["t.issue_key".to_string()],
        latest_by: "t.ingested_at".to_string(),
    }));

    let base = q.base_sql();
    assert!(base.contains(&format!(
        "ROW_NUMBER() OVER (PARTITION BY {}, t.issue_key ORDER BY t.ingested_at DESC) AS agg_rank",
        key.key_sql()
    )));
    assert!(q.grouped_sql().contains("WHERE agg_rank = 1 GROUP BY agg_key"));
}

#[test]
fn narrowing_pins_parent_bucket_and_swaps_key() {
    let parent = query(GroupKey::column("t.project_name", UNKNOWN), Measure::Count);
    let next = GroupKey::column("t.status", UNKNOWN);
    let child = parent.narrowed("lens-api", &next);

    assert_eq!(child.key, next);
    assert_eq!(child.page, None);
    assert_eq!(child.sort, GroupSort::default_for(&next));
    assert_eq!(
        child.conditions.clauses().last().unwrap(),
        &format!("{} = ?", parent.key.key_sql())
    );
    assert_eq!(child.conditions.params(), &[Value::Text("lens-api".to_string())]);
}

#[test]
fn weight_reads_whichever_count_is_present() {
    let counted = AggregationResult {
        count: Some(3),
        ..AggregationResult::default()
    };
    let tickets = AggregationResult {
        total_tickets: Some(5),
        ..AggregationResult::default()
    };
    assert_eq!(counted.weight(), 3);
    assert_eq!(tickets.weight(), 5);
    assert_eq!(AggregationResult::default().weight(), 0);
}

#[test]
fn empty_fields_are_left_out_of_json() {
    let result = AggregationResult {
        key: "FAILED".to_string(),
        count: Some(20),
        ..AggregationResult::default()
    };
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"key":"FAILED","count":20}"#
    );
}
