use super::tenant::Tenant;
use crate::engine::errors::EngineError;

#[test]
fn accepts_lowercase_identifiers() {
    for name in ["acme", "acme_corp", "t1", "a"] {
        let tenant = Tenant::parse(name).unwrap();
        assert_eq!(tenant.as_str(), name);
    }
}

#[test]
fn rejects_names_that_are_not_plain_identifiers() {
    for name in ["", "Acme", "1acme", "acme-corp", "acme.jira", "acme\"; DROP", "main", "temp"] {
        let err = Tenant::parse(name).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTenant(ref n) if n == name), "{name}");
    }
}

#[test]
fn qualifies_tables_with_quoted_schema() {
    let tenant = Tenant::parse("acme").unwrap();
    assert_eq!(tenant.schema(), "\"acme\"");
    assert_eq!(tenant.table("jira_issues"), "\"acme\".jira_issues");
}

#[test]
fn deserializes_through_validation() {
    let tenant: Tenant = serde_json::from_str("\"acme\"").unwrap();
    assert_eq!(tenant.to_string(), "acme");

    let err = serde_json::from_str::<Tenant>("\"Not Valid\"").unwrap_err();
    assert!(err.to_string().contains("Invalid tenant name"));
}
