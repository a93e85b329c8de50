use super::service::{Integration, parse_integration_id, parse_integration_ids};
use crate::engine::errors::EngineError;
use crate::engine::query::ValueFilter;
use crate::test_helpers::TestTenant;

#[test]
fn first_integration_gets_id_one() {
    let t = TestTenant::new();
    assert_eq!(t.integration_id, "1");

    let stored = t.engine.integrations.get(&t.tenant, "1").unwrap().unwrap();
    assert_eq!(stored.name, "primary");
    assert_eq!(stored.application, "github");
    assert_eq!(stored.status, "active");
    assert!(stored.created_at.is_some());
}

#[test]
fn duplicate_name_keeps_constraint_name() {
    let t = TestTenant::new();
    let err = t
        .engine
        .integrations
        .insert(&t.tenant, &Integration::new("primary", "jira"))
        .unwrap_err();
    match err {
        EngineError::Constraint(msg) => assert!(msg.contains("integrations.name"), "{msg}"),
        other => panic!("expected constraint error, got {other:?}"),
    }
}

#[test]
fn list_is_ordered_by_id() {
    let t = TestTenant::new();
    t.integration("tickets", "zendesk");
    t.integration("issues", "jira");

    let listed = t.engine.integrations.list(&t.tenant, None, None).unwrap();
    let names: Vec<&str> = listed.records.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["primary", "tickets", "issues"]);
    assert_eq!(listed.total_count, 3);

    let second_page = t.engine.integrations.list(&t.tenant, Some(1), Some(2)).unwrap();
    assert_eq!(second_page.records.len(), 1);
    assert_eq!(second_page.records[0].id.as_deref(), Some("3"));
}

#[test]
fn malformed_id_reads_as_missing() {
    let t = TestTenant::new();
    assert!(t.engine.integrations.get(&t.tenant, "abc").unwrap().is_none());
    assert!(t.engine.integrations.get(&t.tenant, "42").unwrap().is_none());
}

#[test]
fn delete_cascades_to_identities() {
    let t = TestTenant::new();
    let user = t.user("c-1", "Dana");

    assert!(t.engine.integrations.delete(&t.tenant, &t.integration_id).unwrap());
    assert!(t.engine.users.get(&t.tenant, &user).unwrap().is_none());
    assert!(!t.engine.integrations.delete(&t.tenant, &t.integration_id).unwrap());
}

#[test]
fn ids_parse_from_strings() {
    assert_eq!(parse_integration_id(" 7 ").unwrap(), 7);
    assert!(matches!(parse_integration_id("seven"), Err(EngineError::Validation(_))));

    let parsed = parse_integration_ids(&ValueFilter::<String>::one_of(["1", "2"])).unwrap();
    assert_eq!(parsed, ValueFilter::OneOf(vec![1, 2]));
    assert!(parse_integration_ids(&ValueFilter::Unfiltered).unwrap().is_unfiltered());
    assert!(parse_integration_ids(&ValueFilter::<String>::one_of(["1", "x"])).is_err());
}
