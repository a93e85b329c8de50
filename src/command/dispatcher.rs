use serde_json::Value;
use tracing::{debug, error};

use crate::command::handlers::{admin, delete, ingest, query};
use crate::command::types::Command;
use crate::engine::Engine;
use crate::engine::errors::EngineResult;

/// Routes a command to its handler. Runs synchronously on the caller's
/// thread; async callers go through `spawn_blocking`.
pub fn dispatch(cmd: &Command, engine: &Engine) -> EngineResult<Value> {
    use Command::*;

    debug!(target: "lens_db::dispatch", command = cmd.name(), "Dispatching command");

    let result = match cmd {
        Ping | ProvisionTenant { .. } | ListTenants | InsertIntegration { .. } | ListIntegrations { .. }
        | UpsertUser { .. } | CreateTeam { .. } | AddTeamMembers { .. } | UpsertTag { .. } | TagItem { .. }
        | UpsertCicdInstance { .. } | UpsertCicdJob { .. } | InsertCicdJobRun { .. }
        | UpdateZendeskTicket { .. } => admin::handle(cmd, engine),
        IngestBuilds { .. } | IngestBuildBatches { .. } | IngestProjects { .. } | IngestJiraIssues { .. }
        | IngestPullRequests { .. } | IngestCommits { .. } | IngestZendeskTickets { .. } => ingest::handle(cmd, engine),
        QueryBuilds { .. } | QueryBuildBatches { .. } | QueryTestcases { .. } | ListProjects { .. }
        | QueryCicdJobRuns { .. } | QueryJiraIssues { .. } | QueryPullRequests { .. } | QueryCommits { .. }
        | QueryZendeskTickets { .. } => query::handle(cmd, engine),
        Delete { .. } => delete::handle(cmd, engine),
    };

    if let Err(err) = &result {
        error!(target: "lens_db::dispatch", command = cmd.name(), "Command failed");
        err.log_error();
    }
    result
}
