use serde_json::{Value, json};
use tracing::info;

use crate::command::types::{Command, Entity};
use crate::engine::Engine;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::store::Tenant;

pub fn handle(cmd: &Command, engine: &Engine) -> EngineResult<Value> {
    let Command::Delete {
        tenant,
        entity,
        ids,
    } = cmd
    else {
        return Err(EngineError::validation(format!(
            "{} is not a delete command",
            cmd.name()
        )));
    };

    let deleted = delete(engine, tenant, *entity, ids)?;
    info!(target: "lens_db::command", tenant = %tenant, entity = ?entity, requested = ids.len(), deleted, "Deleted rows");
    Ok(json!({ "deleted": deleted }))
}

fn delete(engine: &Engine, tenant: &Tenant, entity: Entity, ids: &[String]) -> EngineResult<usize> {
    let one_by_one = |delete: &dyn Fn(&str) -> EngineResult<bool>| -> EngineResult<usize> {
        let mut deleted = 0;
        for id in ids {
            if delete(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    };

    match entity {
        Entity::Integration => one_by_one(&|id| engine.integrations.delete(tenant, id)),
        Entity::Team => one_by_one(&|id| engine.teams.delete(tenant, id)),
        Entity::CicdInstance => one_by_one(&|id| engine.cicd_instances.delete(tenant, id)),
        Entity::AwsBuild => engine.builds.bulk_delete(tenant, ids),
        Entity::AwsBuildBatch => engine.build_batches.bulk_delete(tenant, ids),
        Entity::AwsProject => engine.projects.bulk_delete(tenant, ids),
        Entity::CicdJobRun => engine.cicd_job_runs.bulk_delete(tenant, ids),
        Entity::JiraIssue => engine.jira.bulk_delete(tenant, ids),
        Entity::ScmPullRequest => engine.pull_requests.bulk_delete(tenant, ids),
        Entity::ScmCommit => engine.commits.bulk_delete(tenant, ids),
        Entity::ZendeskTicket => engine.zendesk.bulk_delete(tenant, ids),
    }
}
