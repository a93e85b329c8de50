use serde_json::{Value, json};
use tracing::info;

use crate::command::types::Command;
use crate::engine::Engine;
use crate::engine::errors::{EngineError, EngineResult};
use crate::ingest;

/// Maps vendor payloads and upserts the resulting rows. Returns the stored
/// row ids in payload order.
pub fn handle(cmd: &Command, engine: &Engine) -> EngineResult<Value> {
    let ids = match cmd {
        Command::IngestBuilds {
            tenant,
            integration_id,
            builds,
        } => builds
            .iter()
            .map(|build| {
                let row = ingest::map_build(build, integration_id)?;
                engine.builds.insert(tenant, &row)
            })
            .collect::<EngineResult<Vec<_>>>()?,
        Command::IngestBuildBatches {
            tenant,
            integration_id,
            build_batches,
        } => build_batches
            .iter()
            .map(|batch| {
                let row = ingest::map_build_batch(batch, integration_id)?;
                engine.build_batches.insert(tenant, &row)
            })
            .collect::<EngineResult<Vec<_>>>()?,
        Command::IngestProjects {
            tenant,
            integration_id,
            projects,
        } => projects
            .iter()
            .map(|project| {
                let row = ingest::map_project(project, integration_id)?;
                engine.projects.upsert(tenant, &row)
            })
            .collect::<EngineResult<Vec<_>>>()?,
        Command::IngestJiraIssues {
            tenant,
            integration_id,
            ingested_at,
            issues,
        } => {
            let resolver = engine.users.resolver(tenant);
            issues
                .iter()
                .map(|issue| {
                    let row = ingest::map_issue(issue, integration_id, *ingested_at, &resolver)?;
                    engine.jira.upsert(tenant, &row)
                })
                .collect::<EngineResult<Vec<_>>>()?
        }
        Command::IngestPullRequests {
            tenant,
            integration_id,
            repo_id,
            pull_requests,
        } => {
            let resolver = engine.users.resolver(tenant);
            pull_requests
                .iter()
                .map(|pr| {
                    let row = ingest::map_pull_request(pr, repo_id, integration_id, &resolver)?;
                    engine.pull_requests.upsert(tenant, &row)
                })
                .collect::<EngineResult<Vec<_>>>()?
        }
        Command::IngestCommits {
            tenant,
            integration_id,
            repo_id,
            commits,
        } => {
            let resolver = engine.users.resolver(tenant);
            commits
                .iter()
                .map(|commit| {
                    let row = ingest::map_commit(commit, repo_id, integration_id, &resolver)?;
                    engine.commits.upsert(tenant, &row)
                })
                .collect::<EngineResult<Vec<_>>>()?
        }
        Command::IngestZendeskTickets {
            tenant,
            integration_id,
            ingested_at,
            tickets,
        } => {
            let resolver = engine.users.resolver(tenant);
            tickets
                .iter()
                .map(|ticket| {
                    let row = ingest::map_ticket(ticket, integration_id, *ingested_at, &resolver)?;
                    engine.zendesk.insert(tenant, &row)
                })
                .collect::<EngineResult<Vec<_>>>()?
        }
        other => {
            return Err(EngineError::validation(format!(
                "{} is not an ingest command",
                other.name()
            )));
        }
    };

    info!(target: "lens_db::ingest", command = cmd.name(), rows = ids.len(), "Ingested payloads");
    Ok(json!({ "ids": ids, "count": ids.len() }))
}
