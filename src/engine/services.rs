use tracing::info;

use crate::engine::domain::builds::{BuildBatchService, BuildService, ProjectService, TestcaseService};
use crate::engine::domain::cicd::{CiCdInstanceService, CiCdJobRunService, CiCdJobService};
use crate::engine::domain::jira::JiraIssueService;
use crate::engine::domain::scm::{ScmCommitService, ScmPullRequestService};
use crate::engine::domain::zendesk::ZendeskTicketService;
use crate::engine::errors::EngineResult;
use crate::engine::identity::{TeamService, UserIdentityService};
use crate::engine::integrations::IntegrationService;
use crate::engine::store::{Database, DatabaseService, StoreOptions, Tenant};
use crate::engine::tags::TagService;
use crate::shared::config::Settings;

/// Every service over one shared database handle.
pub struct Engine {
    pub db: Database,
    pub integrations: IntegrationService,
    pub users: UserIdentityService,
    pub teams: TeamService,
    pub tags: TagService,
    pub projects: ProjectService,
    pub builds: BuildService,
    pub testcases: TestcaseService,
    pub build_batches: BuildBatchService,
    pub cicd_instances: CiCdInstanceService,
    pub cicd_jobs: CiCdJobService,
    pub cicd_job_runs: CiCdJobRunService,
    pub jira: JiraIssueService,
    pub pull_requests: ScmPullRequestService,
    pub commits: ScmCommitService,
    pub zendesk: ZendeskTicketService,
}

impl Engine {
    pub fn new(db: Database) -> Self {
        Self {
            integrations: IntegrationService::new(db.clone()),
            users: UserIdentityService::new(db.clone()),
            teams: TeamService::new(db.clone()),
            tags: TagService::new(db.clone()),
            projects: ProjectService::new(db.clone()),
            builds: BuildService::new(db.clone()),
            testcases: TestcaseService::new(db.clone()),
            build_batches: BuildBatchService::new(db.clone()),
            cicd_instances: CiCdInstanceService::new(db.clone()),
            cicd_jobs: CiCdJobService::new(db.clone()),
            cicd_job_runs: CiCdJobRunService::new(db.clone()),
            jira: JiraIssueService::new(db.clone()),
            pull_requests: ScmPullRequestService::new(db.clone()),
            commits: ScmCommitService::new(db.clone()),
            zendesk: ZendeskTicketService::new(db.clone()),
            db,
        }
    }

    /// Opens the store and brings every tenant found in it up to the
    /// current table set.
    pub fn open(options: StoreOptions) -> EngineResult<Self> {
        let engine = Self::new(Database::open(options)?);
        for name in engine.db.tenants()? {
            engine.ensure_tenant(&Tenant::parse(&name)?)?;
        }
        Ok(engine)
    }

    pub fn in_memory() -> EngineResult<Self> {
        Ok(Self::new(Database::in_memory()?))
    }

    pub fn from_settings(settings: &Settings) -> EngineResult<Self> {
        Self::open(StoreOptions::from_settings(settings))
    }

    /// Provisions the tenant schema and every table. Safe to repeat.
    pub fn ensure_tenant(&self, tenant: &Tenant) -> EngineResult<()> {
        self.db.ensure_schema_existence(tenant)?;
        for service in self.provisioners() {
            service.ensure_table_existence(tenant)?;
        }
        info!(target: "lens_db::store", tenant = %tenant, "Tenant provisioned");
        Ok(())
    }

    /// Services in foreign key order: referenced tables first.
    fn provisioners(&self) -> [&dyn DatabaseService; 15] {
        [
            &self.integrations,
            &self.users,
            &self.teams,
            &self.tags,
            &self.projects,
            &self.builds,
            &self.testcases,
            &self.build_batches,
            &self.cicd_instances,
            &self.cicd_jobs,
            &self.cicd_job_runs,
            &self.jira,
            &self.pull_requests,
            &self.commits,
            &self.zendesk,
        ]
    }
}
