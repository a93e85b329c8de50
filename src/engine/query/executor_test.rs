use rusqlite::params;

use super::aggregation::{AggregationQuery, GroupKey, Measure, UNKNOWN};
use super::conditions::Conditions;
use super::executor::{self, ListQuery};
use super::filter::ValueFilter;
use super::page::Page;
use super::sort::SortingOrder;
use crate::engine::store::{Database, Tenant};
use crate::shared::datetime::AggInterval;
use crate::test_helpers::factories::TimestampFactory;

struct Runs {
    db: Database,
    tenant: Tenant,
}

/// (id, project, status, started_at, duration)
const ROWS: &[(&str, &str, Option<&str>, (u32, u32), i64)] = &[
    ("r1", "api", Some("FAILED"), (1, 8), 30),
    ("r2", "api", Some("FAILED"), (1, 9), 50),
    ("r3", "api", Some("SUCCEEDED"), (1, 15), 10),
    ("r4", "web", Some("FAILED"), (1, 16), 70),
    ("r5", "web", None, (2, 1), 20),
    ("r6", "docs", Some(""), (2, 2), 40),
];

impl Runs {
    fn new() -> Self {
        let db = Database::in_memory().unwrap();
        let tenant = Tenant::parse("acme").unwrap();
        db.ensure_schema_existence(&tenant).unwrap();
        db.with_tenant(&tenant, |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE {}.runs (id TEXT PRIMARY KEY, project TEXT, status TEXT, started_at INTEGER, duration INTEGER)",
                tenant.schema()
            ))?;
            for (id, project, status, (month, day), duration) in ROWS {
                conn.execute(
                    &format!("INSERT INTO {} VALUES (?1, ?2, ?3, ?4, ?5)", tenant.table("runs")),
                    params![id, project, status, TimestampFactory::utc_datetime(2024, *month, *day, 12, 0, 0), duration],
                )?;
            }
            Ok(())
        })
        .unwrap();
        Self { db, tenant }
    }

    fn from(&self) -> String {
        format!("{} AS t", self.tenant.table("runs"))
    }

    fn conditions(&self) -> Conditions {
        Conditions::new(&self.tenant)
    }

    fn aggregation(&self, key: GroupKey, measure: Measure) -> AggregationQuery {
        AggregationQuery::new(self.from(), self.conditions(), key, measure)
    }
}

#[test]
fn list_pages_and_counts_matches() {
    let runs = Runs::new();
    let mut conditions = runs.conditions();
    conditions.one_of("t.project", &ValueFilter::<String>::one_of(["api", "web"]));

    let page = |n| {
        let query = ListQuery {
            from: runs.from(),
            conditions: &conditions,
            order_by: "t.started_at",
            order: SortingOrder::Asc,
            page: Page::new(n, 3),
        };
        runs.db
            .with_tenant(&runs.tenant, |conn| executor::list(conn, &query, |row| row.get::<_, String>("id")))
            .unwrap()
    };

    let first = page(0);
    assert_eq!(first.records, vec!["r1", "r2", "r3"]);
    assert_eq!(first.count, 3);
    assert_eq!(first.total_count, 5);

    let second = page(1);
    assert_eq!(second.records, vec!["r4", "r5"]);
    assert_eq!(second.count, 2);
    assert_eq!(second.total_count, 5);

    let past_end = page(4);
    assert!(past_end.records.is_empty());
    assert_eq!(past_end.total_count, 5);
}

#[test]
fn zero_page_size_only_counts() {
    let runs = Runs::new();
    let conditions = runs.conditions();
    let query = ListQuery {
        from: runs.from(),
        conditions: &conditions,
        order_by: "t.started_at",
        order: SortingOrder::Desc,
        page: Page::new(0, 0),
    };
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::list(conn, &query, |row| row.get::<_, String>("id")))
        .unwrap();
    assert_eq!(result.count, 0);
    assert_eq!(result.total_count, ROWS.len());
}

#[test]
fn group_by_counts_per_bucket_with_sentinel() {
    let runs = Runs::new();
    let query = runs.aggregation(GroupKey::column("t.status", UNKNOWN), Measure::Count);
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::group_by_and_calculate(conn, &query))
        .unwrap();

    let buckets: Vec<(&str, i64)> = result
        .records
        .iter()
        .map(|r| (r.key.as_str(), r.count.unwrap()))
        .collect();
    assert_eq!(buckets, vec![("FAILED", 3), ("UNKNOWN", 2), ("SUCCEEDED", 1)]);
    assert_eq!(result.total_count, 3);
}

#[test]
fn stats_measure_reports_min_max_median() {
    let runs = Runs::new();
    let query = runs.aggregation(GroupKey::column("t.project", UNKNOWN), Measure::stats("t.duration"));
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::group_by_and_calculate(conn, &query))
        .unwrap();

    let api = result.records.iter().find(|r| r.key == "api").unwrap();
    assert_eq!(api.min, Some(10.0));
    assert_eq!(api.max, Some(50.0));
    assert_eq!(api.median, Some(30.0));
    assert_eq!(api.count, Some(3));
    // sorted by max, largest first
    assert_eq!(result.records[0].key, "web");
}

#[test]
fn trend_buckets_by_iso_week_newest_first() {
    let runs = Runs::new();
    let query = runs.aggregation(GroupKey::interval("t.started_at", AggInterval::Week), Measure::Count);
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::group_by_and_calculate(conn, &query))
        .unwrap();

    let buckets: Vec<(String, i64, Option<String>)> = result
        .records
        .iter()
        .map(|r| (r.key.clone(), r.count.unwrap(), r.additional_key.clone()))
        .collect();
    assert_eq!(
        buckets,
        vec![
            (TimestampFactory::utc_date(2024, 1, 29).to_string(), 2, Some("5-2024".to_string())),
            (TimestampFactory::utc_date(2024, 1, 15).to_string(), 2, Some("3-2024".to_string())),
            (TimestampFactory::utc_date(2024, 1, 8).to_string(), 2, Some("2-2024".to_string())),
        ]
    );
}

#[test]
fn bucket_pagination_reports_total_buckets() {
    let runs = Runs::new();
    let query = runs
        .aggregation(GroupKey::column("t.project", UNKNOWN), Measure::Count)
        .with_page(Some(Page::new(0, 2)));
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::group_by_and_calculate(conn, &query))
        .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(result.total_count, 3);
    assert_eq!(result.records[0].key, "api");
}

#[test]
fn stacked_buckets_add_up_to_parent() {
    let runs = Runs::new();
    let query = runs.aggregation(GroupKey::column("t.project", UNKNOWN), Measure::Count);
    let stacks = [GroupKey::column("t.status", UNKNOWN)];
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
        .unwrap();

    assert_eq!(result.total_count, 3);
    for bucket in &result.records {
        let nested = bucket.stacks.as_ref().unwrap();
        let sum: i64 = nested.iter().map(|s| s.weight()).sum();
        assert_eq!(sum, bucket.weight(), "bucket {}", bucket.key);
    }

    let api = result.records.iter().find(|r| r.key == "api").unwrap();
    let nested: Vec<(&str, i64)> = api
        .stacks
        .as_ref()
        .unwrap()
        .iter()
        .map(|s| (s.key.as_str(), s.count.unwrap()))
        .collect();
    assert_eq!(nested, vec![("FAILED", 2), ("SUCCEEDED", 1)]);
}

#[test]
fn stacking_under_sentinel_bucket_finds_null_rows() {
    let runs = Runs::new();
    let query = runs.aggregation(GroupKey::column("t.status", UNKNOWN), Measure::Count);
    let stacks = [GroupKey::column("t.project", UNKNOWN)];
    let result = runs
        .db
        .with_tenant(&runs.tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
        .unwrap();

    let unknown = result.records.iter().find(|r| r.key == "UNKNOWN").unwrap();
    let mut projects: Vec<&str> = unknown
        .stacks
        .as_ref()
        .unwrap()
        .iter()
        .map(|s| s.key.as_str())
        .collect();
    projects.sort();
    assert_eq!(projects, vec!["docs", "web"]);
}
