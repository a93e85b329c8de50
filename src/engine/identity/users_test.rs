use super::users::{DbUser, IdentityResolver};
use crate::engine::errors::EngineError;
use crate::engine::query::ValueFilter;
use crate::test_helpers::TestTenant;

#[test]
fn upsert_keeps_id_and_refreshes_name() {
    let t = TestTenant::new();
    let first = t.user("cloud-1", "Dana");
    let again = t.user("cloud-1", "Dana Scully");
    assert_eq!(first, again);

    let stored = t.engine.users.get(&t.tenant, &first).unwrap().unwrap();
    assert_eq!(stored.display_name, "Dana Scully");
    assert_eq!(stored.integration_id, t.integration_id);
}

#[test]
fn missing_email_does_not_erase_known_one() {
    let t = TestTenant::new();
    let mut user = DbUser::new(&t.integration_id, "cloud-1", "Dana");
    user.email = Some("dana@example.com".to_string());
    let id = t.engine.users.upsert(&t.tenant, &user).unwrap();

    t.user("cloud-1", "Dana");
    let stored = t.engine.users.get(&t.tenant, &id).unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("dana@example.com"));
}

#[test]
fn same_cloud_id_under_other_integration_is_another_identity() {
    let t = TestTenant::new();
    let other = t.integration("issues", "jira");
    let a = t.user("cloud-1", "Dana");
    let b = t
        .engine
        .users
        .upsert(&t.tenant, &DbUser::new(&other, "cloud-1", "Dana"))
        .unwrap();
    assert_ne!(a, b);
}

#[test]
fn lookup_prefers_cloud_id_over_display_name() {
    let t = TestTenant::new();
    let by_name = t.user("c-1", "fox");
    let by_cloud = t.user("fox", "Fox Mulder");

    let found = t.engine.users.get_user(&t.tenant, &t.integration_id, "fox").unwrap();
    assert_eq!(found, Some(by_cloud));

    let found = t.engine.users.get_user(&t.tenant, &t.integration_id, "c-1").unwrap();
    assert_eq!(found, Some(by_name));

    assert_eq!(t.engine.users.get_user(&t.tenant, &t.integration_id, "nobody").unwrap(), None);
    assert_eq!(t.engine.users.get_user(&t.tenant, "nan", "fox").unwrap(), None);
}

#[test]
fn unknown_integration_is_rejected_by_foreign_key() {
    let t = TestTenant::new();
    let err = t
        .engine
        .users
        .upsert(&t.tenant, &DbUser::new("99", "cloud-1", "Dana"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Constraint(ref m) if m.contains("FOREIGN KEY")));
}

#[test]
fn list_filters_by_integration_and_sorts_by_name() {
    let t = TestTenant::new();
    let other = t.integration("issues", "jira");
    t.user("c-2", "Walter");
    t.user("c-1", "Dana");
    t.engine
        .users
        .upsert(&t.tenant, &DbUser::new(&other, "c-3", "Alex"))
        .unwrap();

    let all = t
        .engine
        .users
        .list(&t.tenant, &ValueFilter::Unfiltered, None, None)
        .unwrap();
    let names: Vec<&str> = all.records.iter().map(|u| u.display_name.as_str()).collect();
    assert_eq!(names, vec!["Alex", "Dana", "Walter"]);

    let primary = t
        .engine
        .users
        .list(&t.tenant, &ValueFilter::one_of([t.integration_id.clone()]), None, None)
        .unwrap();
    assert_eq!(primary.total_count, 2);
}

#[test]
fn tenant_resolver_registers_on_first_sight() {
    let t = TestTenant::new();
    let resolver = t.engine.users.resolver(&t.tenant);
    let id = resolver.resolve(&t.integration_id, "c-9", "Monica").unwrap();
    assert_eq!(resolver.resolve(&t.integration_id, "c-9", "Monica").unwrap(), id);
    assert_eq!(
        t.engine.users.get(&t.tenant, &id).unwrap().unwrap().cloud_id,
        "c-9"
    );
}
