use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::command::types::{Command, QueryAction};
use crate::engine::Engine;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::query::AggregationResult;
use crate::shared::response::DbListResponse;

/// Runs the list or aggregation the command asks for.
pub fn handle(cmd: &Command, engine: &Engine) -> EngineResult<Value> {
    debug!(target: "lens_db::command", command = cmd.name(), "Running query command");
    match cmd {
        Command::QueryBuilds {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.builds.list_by_filter(tenant, filter),
            || engine.builds.group_by_and_calculate(tenant, filter),
            || engine.builds.stacked_group_by(tenant, filter),
        ),
        Command::QueryBuildBatches {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.build_batches.list_by_filter(tenant, filter),
            || engine.build_batches.group_by_and_calculate(tenant, filter),
            || engine.build_batches.stacked_group_by(tenant, filter),
        ),
        Command::QueryTestcases {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.testcases.list_by_filter(tenant, filter),
            || engine.testcases.group_by_and_calculate(tenant, filter),
            || engine.testcases.stacked_group_by(tenant, filter),
        ),
        Command::ListProjects { tenant, filter } => {
            Ok(serde_json::to_value(engine.projects.list_by_filter(tenant, filter)?)?)
        }
        Command::QueryCicdJobRuns {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.cicd_job_runs.list_by_filter(tenant, filter),
            || engine.cicd_job_runs.group_by_and_calculate(tenant, filter),
            || engine.cicd_job_runs.stacked_group_by(tenant, filter),
        ),
        Command::QueryJiraIssues {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.jira.list_by_filter(tenant, filter),
            || engine.jira.group_by_and_calculate(tenant, filter),
            || engine.jira.stacked_group_by(tenant, filter),
        ),
        Command::QueryPullRequests {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.pull_requests.list_by_filter(tenant, filter),
            || engine.pull_requests.group_by_and_calculate(tenant, filter),
            || engine.pull_requests.stacked_group_by(tenant, filter),
        ),
        Command::QueryCommits {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.commits.list_by_filter(tenant, filter),
            || engine.commits.group_by_and_calculate(tenant, filter),
            || engine.commits.stacked_group_by(tenant, filter),
        ),
        Command::QueryZendeskTickets {
            tenant,
            action,
            filter,
        } => run(
            *action,
            || engine.zendesk.list_by_filter(tenant, filter),
            || engine.zendesk.group_by_and_calculate(tenant, filter),
            || engine.zendesk.stacked_group_by(tenant, filter),
        ),
        other => Err(EngineError::validation(format!(
            "{} is not a query command",
            other.name()
        ))),
    }
}

type Aggregated = EngineResult<DbListResponse<AggregationResult>>;

fn run<T: Serialize>(
    action: QueryAction,
    list: impl FnOnce() -> EngineResult<DbListResponse<T>>,
    group_by: impl FnOnce() -> Aggregated,
    stacked: impl FnOnce() -> Aggregated,
) -> EngineResult<Value> {
    let value = match action {
        QueryAction::List => serde_json::to_value(list()?)?,
        QueryAction::GroupBy => serde_json::to_value(group_by()?)?,
        QueryAction::StackedGroupBy => serde_json::to_value(stacked()?)?,
    };
    Ok(value)
}
