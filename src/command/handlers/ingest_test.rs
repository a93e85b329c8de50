use serde_json::json;

use super::ingest;
use crate::command::types::Command;
use crate::engine::domain::jira::JiraFilter;
use crate::engine::errors::EngineError;
use crate::engine::query::ValueFilter;
use crate::test_helpers::TestTenant;
use crate::test_helpers::fixtures::{codebuild_builds, jira_snapshots};

#[test]
fn builds_are_stored_and_reingest_is_idempotent() {
    let t = TestTenant::new();
    let cmd = Command::IngestBuilds {
        tenant: t.tenant.clone(),
        integration_id: t.integration_id.clone(),
        builds: codebuild_builds(),
    };

    let first = ingest::handle(&cmd, &t.engine).unwrap();
    assert_eq!(first["count"], json!(22));
    let second = ingest::handle(&cmd, &t.engine).unwrap();
    assert_eq!(second["ids"], first["ids"]);
    assert_eq!(t.engine.builds.list(&t.tenant, None, None).unwrap().total_count, 22);
}

#[test]
fn jira_ingest_registers_identities() {
    let t = TestTenant::new();
    let snapshot = jira_snapshots().remove(0);
    let cmd = Command::IngestJiraIssues {
        tenant: t.tenant.clone(),
        integration_id: t.integration_id.clone(),
        ingested_at: snapshot.ingested_at,
        issues: snapshot.issues,
    };
    let out = ingest::handle(&cmd, &t.engine).unwrap();
    assert_eq!(out["count"], json!(5));

    let alice = t
        .engine
        .users
        .get_user(&t.tenant, &t.integration_id, "alice-1")
        .unwrap()
        .unwrap();
    let filter = JiraFilter {
        assignees: ValueFilter::one_of([alice]),
        ..JiraFilter::default()
    };
    let issues = t.engine.jira.list_by_filter(&t.tenant, &filter).unwrap();
    let keys: Vec<&str> = issues.records.iter().map(|i| i.issue_key.as_str()).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"LENS-1") && keys.contains(&"LENS-4"));
}

#[test]
fn bad_payload_aborts_with_validation_error() {
    let t = TestTenant::new();
    let mut builds = codebuild_builds();
    builds[1].arn = "garbage".into();
    let cmd = Command::IngestBuilds {
        tenant: t.tenant.clone(),
        integration_id: t.integration_id.clone(),
        builds,
    };
    let err = ingest::handle(&cmd, &t.engine).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn unknown_integration_is_a_constraint_error() {
    let t = TestTenant::new();
    let cmd = Command::IngestBuilds {
        tenant: t.tenant.clone(),
        integration_id: "99".into(),
        builds: codebuild_builds(),
    };
    let err = ingest::handle(&cmd, &t.engine).unwrap_err();
    assert!(err.is_constraint());
}
