use serde_json::{Value, json};
use tracing::info;

use crate::command::types::Command;
use crate::engine::Engine;
use crate::engine::errors::{EngineError, EngineResult};

/// Tenant provisioning and the small reference tables: integrations,
/// identities, teams, tags and CI/CD topology.
pub fn handle(cmd: &Command, engine: &Engine) -> EngineResult<Value> {
    match cmd {
        Command::Ping => Ok(json!("pong")),
        Command::ProvisionTenant { tenant } => {
            engine.ensure_tenant(tenant)?;
            info!(target: "lens_db::command", tenant = %tenant, "Provisioned tenant");
            Ok(json!({ "tenant": tenant }))
        }
        Command::ListTenants => Ok(json!(engine.db.tenants()?)),
        Command::InsertIntegration { tenant, integration } => {
            let id = engine.integrations.insert(tenant, integration)?;
            Ok(json!({ "id": id }))
        }
        Command::ListIntegrations {
            tenant,
            page,
            page_size,
        } => Ok(serde_json::to_value(
            engine.integrations.list(tenant, *page, *page_size)?,
        )?),
        Command::UpsertUser { tenant, user } => {
            let id = engine.users.upsert(tenant, user)?;
            Ok(json!({ "id": id }))
        }
        Command::CreateTeam { tenant, name } => {
            let id = engine.teams.create(tenant, name)?;
            Ok(json!({ "id": id }))
        }
        Command::AddTeamMembers {
            tenant,
            team_id,
            user_ids,
        } => {
            let added = engine.teams.add_members(tenant, team_id, user_ids)?;
            Ok(json!({ "added": added }))
        }
        Command::UpsertTag { tenant, name } => {
            let id = engine.tags.upsert(tenant, name)?;
            Ok(json!({ "id": id }))
        }
        Command::TagItem {
            tenant,
            tag_id,
            item_type,
            item_id,
        } => {
            engine.tags.tag(tenant, *tag_id, *item_type, item_id)?;
            Ok(json!({ "tagged": true }))
        }
        Command::UpsertCicdInstance { tenant, instance } => {
            let id = engine.cicd_instances.upsert(tenant, instance)?;
            Ok(json!({ "id": id }))
        }
        Command::UpsertCicdJob { tenant, job } => {
            let id = engine.cicd_jobs.upsert(tenant, job)?;
            Ok(json!({ "id": id }))
        }
        Command::InsertCicdJobRun { tenant, run } => {
            let id = engine.cicd_job_runs.insert(tenant, run)?;
            Ok(json!({ "id": id }))
        }
        Command::UpdateZendeskTicket { tenant, id, update } => {
            let updated = engine.zendesk.update(tenant, id, update)?;
            Ok(json!({ "updated": updated }))
        }
        other => Err(EngineError::validation(format!(
            "{} is not an admin command",
            other.name()
        ))),
    }
}
