use serde_json::json;

use super::query;
use crate::command::types::{Command, QueryAction};
use crate::engine::domain::builds::{BuildsAcross, BuildsFilter};
use crate::engine::errors::EngineError;
use crate::ingest::map_build;
use crate::test_helpers::TestTenant;
use crate::test_helpers::fixtures::codebuild_builds;

fn seeded() -> TestTenant {
    let t = TestTenant::new();
    for build in codebuild_builds() {
        let row = map_build(&build, &t.integration_id).unwrap();
        t.engine.builds.insert(&t.tenant, &row).unwrap();
    }
    t
}

fn query_builds(t: &TestTenant, action: QueryAction, filter: BuildsFilter) -> Result<serde_json::Value, EngineError> {
    query::handle(
        &Command::QueryBuilds {
            tenant: t.tenant.clone(),
            action,
            filter,
        },
        &t.engine,
    )
}

#[test]
fn list_action_returns_paged_envelope() {
    let t = seeded();
    let filter = BuildsFilter {
        page: Some(0),
        page_size: Some(5),
        ..BuildsFilter::default()
    };
    let out = query_builds(&t, QueryAction::List, filter).unwrap();
    assert_eq!(out["count"], json!(5));
    assert_eq!(out["total_count"], json!(22));
    assert_eq!(out["records"].as_array().unwrap().len(), 5);
}

#[test]
fn group_by_action_returns_buckets() {
    let t = seeded();
    let filter = BuildsFilter {
        across: Some(BuildsAcross::Region),
        ..BuildsFilter::default()
    };
    let out = query_builds(&t, QueryAction::GroupBy, filter).unwrap();
    assert_eq!(out["total_count"], json!(2));
    assert_eq!(
        out["records"],
        json!([{"key": "eu-west-1", "count": 11}, {"key": "us-east-1", "count": 11}])
    );
}

#[test]
fn stacked_action_nests_buckets() {
    let t = seeded();
    let filter = BuildsFilter {
        across: Some(BuildsAcross::Region),
        stacks: vec![BuildsAcross::Status],
        ..BuildsFilter::default()
    };
    let out = query_builds(&t, QueryAction::StackedGroupBy, filter).unwrap();
    assert_eq!(
        out["records"][0]["stacks"],
        json!([{"key": "FAILED", "count": 9}, {"key": "SUCCEEDED", "count": 2}])
    );
}

#[test]
fn validation_errors_surface_unchanged() {
    let t = seeded();
    let err = query_builds(&t, QueryAction::GroupBy, BuildsFilter::default()).unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("across")));
}

#[test]
fn rejects_commands_it_does_not_own() {
    let t = TestTenant::new();
    assert!(matches!(
        query::handle(&Command::Ping, &t.engine),
        Err(EngineError::Validation(_))
    ));
}
