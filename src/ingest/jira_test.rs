use serde_json::json;

use super::jira::{JiraIssuePayload, map_issue, parse_timestamp};
use crate::engine::errors::EngineError;
use crate::test_helpers::factories::{RecordingResolver, TimestampFactory};
use crate::test_helpers::fixtures::jira_snapshots;

#[test]
fn maps_fields_into_snapshot_row() {
    let snapshot = jira_snapshots().remove(0);
    let resolver = RecordingResolver::new();
    let issue = map_issue(&snapshot.issues[0], "4", snapshot.ingested_at, &resolver).unwrap();

    assert_eq!(issue.issue_key, "LENS-1");
    assert_eq!(issue.ingested_at, snapshot.ingested_at);
    assert_eq!(issue.project.as_deref(), Some("LENS"));
    assert_eq!(issue.issue_type.as_deref(), Some("Story"));
    assert_eq!(issue.status.as_deref(), Some("To Do"));
    assert_eq!(issue.story_points, Some(3.0));
    assert_eq!(issue.assignee.as_deref(), Some("Alice Moreau"));
    assert_eq!(issue.assignee_id, Some(RecordingResolver::id_for("4", "alice-1")));
    assert_eq!(issue.reporter_id, Some(RecordingResolver::id_for("4", "dana-4")));
    assert_eq!(issue.issue_created_at, Some(TimestampFactory::utc_datetime(2024, 1, 2, 9, 12, 0)));
    assert_eq!(issue.first_comment_at, Some(TimestampFactory::utc_datetime(2024, 1, 2, 9, 12, 30)));
}

#[test]
fn unassigned_issue_resolves_only_reporter() {
    let snapshot = jira_snapshots().remove(0);
    let resolver = RecordingResolver::new();
    let issue = map_issue(&snapshot.issues[2], "4", snapshot.ingested_at, &resolver).unwrap();

    assert_eq!(issue.assignee_id, None);
    assert_eq!(issue.assignee, None);
    assert_eq!(resolver.call_count(), 1);
    let calls = resolver.calls.borrow();
    assert_eq!(calls[0], ("4".to_string(), "dana-4".to_string(), "Dana Kim".to_string()));
}

#[test]
fn earliest_comment_wins_and_project_falls_back_to_name() {
    let payload: JiraIssuePayload = serde_json::from_value(json!({
        "key": "OPS-9",
        "fields": {
            "project": {"name": "Operations"},
            "comment": {"comments": [
                {"created": "2024-01-05T10:00:00.000+0000"},
                {"created": "2024-01-04T08:00:00.000+0200"}
            ]}
        }
    }))
    .unwrap();
    let issue = map_issue(&payload, "1", 0, &RecordingResolver::new()).unwrap();

    assert_eq!(issue.project.as_deref(), Some("Operations"));
    assert_eq!(issue.first_comment_at, Some(TimestampFactory::utc_datetime(2024, 1, 4, 6, 0, 0)));
    assert_eq!(issue.status, None);
}

#[test]
fn parses_jira_and_rfc3339_timestamps() {
    let expected = TimestampFactory::utc_datetime(2024, 1, 8, 10, 15, 30);
    assert_eq!(parse_timestamp("2024-01-08T10:15:30.000+0000").unwrap(), expected);
    assert_eq!(parse_timestamp("2024-01-08T10:15:30Z").unwrap(), expected);

    let err = parse_timestamp("yesterday").unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("yesterday")));
}
