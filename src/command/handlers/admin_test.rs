use serde_json::json;

use super::admin;
use crate::command::types::Command;
use crate::engine::Engine;
use crate::engine::domain::zendesk::ZendeskTicketUpdate;
use crate::engine::errors::EngineError;
use crate::engine::identity::DbUser;
use crate::engine::store::Tenant;
use crate::engine::tags::TagItemType;
use crate::test_helpers::TestTenant;

#[test]
fn provisioning_registers_tenant() {
    let engine = Engine::in_memory().unwrap();
    let tenant = Tenant::parse("globex").unwrap();

    let out = admin::handle(&Command::ProvisionTenant { tenant: tenant.clone() }, &engine).unwrap();
    assert_eq!(out, json!({"tenant": "globex"}));
    assert_eq!(admin::handle(&Command::ListTenants, &engine).unwrap(), json!(["globex"]));
}

#[test]
fn integrations_list_as_envelope() {
    let t = TestTenant::new();
    let out = admin::handle(
        &Command::ListIntegrations {
            tenant: t.tenant.clone(),
            page: None,
            page_size: None,
        },
        &t.engine,
    )
    .unwrap();
    assert_eq!(out["count"], json!(1));
    assert_eq!(out["total_count"], json!(1));
    assert_eq!(out["records"][0]["name"], json!("primary"));
}

#[test]
fn team_setup_through_commands() {
    let t = TestTenant::new();
    let user = admin::handle(
        &Command::UpsertUser {
            tenant: t.tenant.clone(),
            user: DbUser::new(&t.integration_id, "dana", "Dana"),
        },
        &t.engine,
    )
    .unwrap();
    let user_id = user["id"].as_str().unwrap().to_string();

    let team = admin::handle(
        &Command::CreateTeam {
            tenant: t.tenant.clone(),
            name: "platform".into(),
        },
        &t.engine,
    )
    .unwrap();
    let team_id = team["id"].as_str().unwrap().to_string();

    let added = admin::handle(
        &Command::AddTeamMembers {
            tenant: t.tenant.clone(),
            team_id: team_id.clone(),
            user_ids: vec![user_id.clone(), user_id.clone()],
        },
        &t.engine,
    )
    .unwrap();
    assert_eq!(added, json!({"added": 1}));
    assert_eq!(t.engine.teams.members(&t.tenant, &team_id).unwrap(), vec![user_id]);
}

#[test]
fn tagging_through_commands() {
    let t = TestTenant::new();
    let tag = admin::handle(
        &Command::UpsertTag {
            tenant: t.tenant.clone(),
            name: "flaky".into(),
        },
        &t.engine,
    )
    .unwrap();
    let tag_id = tag["id"].as_i64().unwrap();

    let out = admin::handle(
        &Command::TagItem {
            tenant: t.tenant.clone(),
            tag_id,
            item_type: TagItemType::AwsBuild,
            item_id: "build-1".into(),
        },
        &t.engine,
    )
    .unwrap();
    assert_eq!(out, json!({"tagged": true}));
    assert_eq!(
        t.engine.tags.tag_ids_for(&t.tenant, TagItemType::AwsBuild, "build-1").unwrap(),
        vec![tag_id]
    );
}

#[test]
fn zendesk_update_reports_missing_ticket() {
    let t = TestTenant::new();
    let out = admin::handle(
        &Command::UpdateZendeskTicket {
            tenant: t.tenant.clone(),
            id: "missing".into(),
            update: ZendeskTicketUpdate::default(),
        },
        &t.engine,
    )
    .unwrap();
    assert_eq!(out, json!({"updated": false}));
}

#[test]
fn rejects_commands_it_does_not_own() {
    let t = TestTenant::new();
    let err = admin::handle(
        &Command::Delete {
            tenant: t.tenant.clone(),
            entity: crate::command::types::Entity::Team,
            ids: vec![],
        },
        &t.engine,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("delete")));
}
