use serde::{Deserialize, Serialize};

use crate::engine::domain::builds::{BuildBatchesFilter, BuildsFilter, ProjectsFilter, TestcasesFilter};
use crate::engine::domain::cicd::{CiCdInstance, CiCdJob, CiCdJobRun, JobRunsFilter};
use crate::engine::domain::jira::JiraFilter;
use crate::engine::domain::scm::{CommitsFilter, PullRequestsFilter};
use crate::engine::domain::zendesk::{ZendeskFilter, ZendeskTicketUpdate};
use crate::engine::errors::EngineResult;
use crate::engine::identity::DbUser;
use crate::engine::integrations::Integration;
use crate::engine::store::Tenant;
use crate::engine::tags::TagItemType;
use crate::ingest::{
    CodeBuildBuild, CodeBuildBuildBatch, CodeBuildProject, GithubCommit, GithubPullRequest, JiraIssuePayload,
    ZendeskTicketPayload,
};

/// Query shape applied to a domain filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryAction {
    #[default]
    List,
    GroupBy,
    StackedGroupBy,
}

/// Entities that support deletion by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Integration,
    Team,
    AwsBuild,
    AwsBuildBatch,
    AwsProject,
    CicdInstance,
    CicdJobRun,
    JiraIssue,
    ScmPullRequest,
    ScmCommit,
    ZendeskTicket,
}

/// One request to the engine, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Ping,
    ProvisionTenant {
        tenant: Tenant,
    },
    ListTenants,

    InsertIntegration {
        tenant: Tenant,
        integration: Integration,
    },
    ListIntegrations {
        tenant: Tenant,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        page_size: Option<u32>,
    },
    UpsertUser {
        tenant: Tenant,
        user: DbUser,
    },
    CreateTeam {
        tenant: Tenant,
        name: String,
    },
    AddTeamMembers {
        tenant: Tenant,
        team_id: String,
        user_ids: Vec<String>,
    },
    UpsertTag {
        tenant: Tenant,
        name: String,
    },
    TagItem {
        tenant: Tenant,
        tag_id: i64,
        item_type: TagItemType,
        item_id: String,
    },

    UpsertCicdInstance {
        tenant: Tenant,
        instance: CiCdInstance,
    },
    UpsertCicdJob {
        tenant: Tenant,
        job: CiCdJob,
    },
    InsertCicdJobRun {
        tenant: Tenant,
        run: CiCdJobRun,
    },
    UpdateZendeskTicket {
        tenant: Tenant,
        id: String,
        update: ZendeskTicketUpdate,
    },

    IngestBuilds {
        tenant: Tenant,
        integration_id: String,
        builds: Vec<CodeBuildBuild>,
    },
    IngestBuildBatches {
        tenant: Tenant,
        integration_id: String,
        build_batches: Vec<CodeBuildBuildBatch>,
    },
    IngestProjects {
        tenant: Tenant,
        integration_id: String,
        projects: Vec<CodeBuildProject>,
    },
    IngestJiraIssues {
        tenant: Tenant,
        integration_id: String,
        ingested_at: i64,
        issues: Vec<JiraIssuePayload>,
    },
    IngestPullRequests {
        tenant: Tenant,
        integration_id: String,
        repo_id: String,
        pull_requests: Vec<GithubPullRequest>,
    },
    IngestCommits {
        tenant: Tenant,
        integration_id: String,
        repo_id: String,
        commits: Vec<GithubCommit>,
    },
    IngestZendeskTickets {
        tenant: Tenant,
        integration_id: String,
        ingested_at: i64,
        tickets: Vec<ZendeskTicketPayload>,
    },

    QueryBuilds {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: BuildsFilter,
    },
    QueryBuildBatches {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: BuildBatchesFilter,
    },
    QueryTestcases {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: TestcasesFilter,
    },
    ListProjects {
        tenant: Tenant,
        #[serde(default)]
        filter: ProjectsFilter,
    },
    QueryCicdJobRuns {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: JobRunsFilter,
    },
    QueryJiraIssues {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: JiraFilter,
    },
    QueryPullRequests {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: PullRequestsFilter,
    },
    QueryCommits {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: CommitsFilter,
    },
    QueryZendeskTickets {
        tenant: Tenant,
        #[serde(default)]
        action: QueryAction,
        #[serde(default)]
        filter: ZendeskFilter,
    },

    Delete {
        tenant: Tenant,
        entity: Entity,
        ids: Vec<String>,
    },
}

impl Command {
    pub fn from_json(bytes: &[u8]) -> EngineResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::ProvisionTenant { .. } => "provision_tenant",
            Command::ListTenants => "list_tenants",
            Command::InsertIntegration { .. } => "insert_integration",
            Command::ListIntegrations { .. } => "list_integrations",
            Command::UpsertUser { .. } => "upsert_user",
            Command::CreateTeam { .. } => "create_team",
            Command::AddTeamMembers { .. } => "add_team_members",
            Command::UpsertTag { .. } => "upsert_tag",
            Command::TagItem { .. } => "tag_item",
            Command::UpsertCicdInstance { .. } => "upsert_cicd_instance",
            Command::UpsertCicdJob { .. } => "upsert_cicd_job",
            Command::InsertCicdJobRun { .. } => "insert_cicd_job_run",
            Command::UpdateZendeskTicket { .. } => "update_zendesk_ticket",
            Command::IngestBuilds { .. } => "ingest_builds",
            Command::IngestBuildBatches { .. } => "ingest_build_batches",
            Command::IngestProjects { .. } => "ingest_projects",
            Command::IngestJiraIssues { .. } => "ingest_jira_issues",
            Command::IngestPullRequests { .. } => "ingest_pull_requests",
            Command::IngestCommits { .. } => "ingest_commits",
            Command::IngestZendeskTickets { .. } => "ingest_zendesk_tickets",
            Command::QueryBuilds { .. } => "query_builds",
            Command::QueryBuildBatches { .. } => "query_build_batches",
            Command::QueryTestcases { .. } => "query_testcases",
            Command::ListProjects { .. } => "list_projects",
            Command::QueryCicdJobRuns { .. } => "query_cicd_job_runs",
            Command::QueryJiraIssues { .. } => "query_jira_issues",
            Command::QueryPullRequests { .. } => "query_pull_requests",
            Command::QueryCommits { .. } => "query_commits",
            Command::QueryZendeskTickets { .. } => "query_zendesk_tickets",
            Command::Delete { .. } => "delete",
        }
    }
}
