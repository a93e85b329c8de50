use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::domain::common::{self, Calculation, Dimension, GroupRequest};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::aggregation::{UNKNOWN, UNKNOWN_USER};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{
    AggregationQuery, AggregationResult, Conditions, GroupKey, Measure, Page, SortingOrder, TimeRange,
    ValueFilter,
};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::{AggInterval, now_epoch_seconds};
use crate::shared::response::DbListResponse;

pub const COMMITS_TABLE: &str = "scm_commits";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("committed_at", "t.committed_at"),
    ("repo_id", "t.repo_id"),
    ("additions", "t.additions"),
    ("deletions", "t.deletions"),
];

/// Natural key: (commit_sha, repo_id, integration_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmCommit {
    #[serde(default)]
    pub id: Option<String>,
    pub integration_id: String,
    pub repo_id: String,
    pub commit_sha: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub committer: Option<String>,
    #[serde(default)]
    pub committer_id: Option<String>,
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
    #[serde(default)]
    pub files_changed: Option<i64>,
    #[serde(default)]
    pub committed_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl ScmCommit {
    pub fn new(integration_id: &str, repo_id: &str, commit_sha: &str) -> Self {
        Self {
            id: None,
            integration_id: integration_id.to_string(),
            repo_id: repo_id.to_string(),
            commit_sha: commit_sha.to_string(),
            message: None,
            author: None,
            author_id: None,
            committer: None,
            committer_id: None,
            additions: None,
            deletions: None,
            files_changed: None,
            committed_at: None,
            created_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            repo_id: row.get("repo_id")?,
            commit_sha: row.get("commit_sha")?,
            message: row.get("message")?,
            author: row.get("author")?,
            author_id: row.get("author_id")?,
            committer: row.get("committer")?,
            committer_id: row.get("committer_id")?,
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            files_changed: row.get("files_changed")?,
            committed_at: row.get("committed_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitsAcross {
    RepoId,
    Author,
    Committer,
    Trend,
}

impl Dimension for CommitsAcross {
    fn name(&self) -> &'static str {
        match self {
            CommitsAcross::RepoId => "repo_id",
            CommitsAcross::Author => "author",
            CommitsAcross::Committer => "committer",
            CommitsAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            CommitsAcross::RepoId => GroupKey::column("t.repo_id", UNKNOWN),
            CommitsAcross::Author => GroupKey::column("t.author_id", UNKNOWN_USER),
            CommitsAcross::Committer => GroupKey::column("t.committer_id", UNKNOWN_USER),
            CommitsAcross::Trend => GroupKey::interval("t.committed_at", interval),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, CommitsAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitsCalculation {
    #[default]
    Count,
    LinesChanged,
}

impl Calculation for CommitsCalculation {
    fn name(&self) -> &'static str {
        match self {
            CommitsCalculation::Count => "count",
            CommitsCalculation::LinesChanged => "lines_changed",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            CommitsCalculation::Count => Measure::Count,
            CommitsCalculation::LinesChanged => {
                Measure::sum("COALESCE(t.additions, 0) + COALESCE(t.deletions, 0)")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitsFilter {
    pub repo_ids: ValueFilter<String>,
    pub exclude_repo_ids: ValueFilter<String>,
    pub authors: ValueFilter<String>,
    pub exclude_authors: ValueFilter<String>,
    pub committers: ValueFilter<String>,
    pub exclude_committers: ValueFilter<String>,
    pub commit_shas: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub committed_at: Option<TimeRange>,
    pub across: Option<CommitsAcross>,
    pub stacks: Vec<CommitsAcross>,
    pub calculation: Option<CommitsCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ScmCommitService {
    db: Database,
}

impl ScmCommitService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn upsert(&self, tenant: &Tenant, commit: &ScmCommit) -> EngineResult<String> {
        let integration_id = parse_integration_id(&commit.integration_id)?;
        let table = tenant.table(COMMITS_TABLE);
        let now = now_epoch_seconds();
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, integration_id, repo_id, commit_sha, message, author, author_id, \
                        committer, committer_id, additions, deletions, files_changed, committed_at, created_at) \
                     VALUES (:id, :integration_id, :repo_id, :sha, :message, :author, :author_id, :committer, \
                        :committer_id, :additions, :deletions, :files_changed, :committed_at, :created_at) \
                     ON CONFLICT (commit_sha, repo_id, integration_id) DO UPDATE SET \
                        message = COALESCE(excluded.message, message), \
                        author_id = COALESCE(excluded.author_id, author_id), \
                        committer_id = COALESCE(excluded.committer_id, committer_id), \
                        additions = COALESCE(excluded.additions, additions), \
                        deletions = COALESCE(excluded.deletions, deletions), \
                        files_changed = COALESCE(excluded.files_changed, files_changed) \
                     RETURNING id"
                ),
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":integration_id": integration_id,
                    ":repo_id": commit.repo_id,
                    ":sha": commit.commit_sha,
                    ":message": commit.message,
                    ":author": commit.author,
                    ":author_id": commit.author_id,
                    ":committer": commit.committer,
                    ":committer_id": commit.committer_id,
                    ":additions": commit.additions,
                    ":deletions": commit.deletions,
                    ":files_changed": commit.files_changed,
                    ":committed_at": commit.committed_at,
                    ":created_at": commit.created_at.unwrap_or(now),
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::scm", tenant = %tenant, sha = %commit.commit_sha, "Upserted commit");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<ScmCommit>> {
        let table = tenant.table(COMMITS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    ScmCommit::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_sha(
        &self,
        tenant: &Tenant,
        integration_id: &str,
        repo_id: &str,
        commit_sha: &str,
    ) -> EngineResult<Option<ScmCommit>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(COMMITS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT * FROM {table} WHERE commit_sha = ?1 AND repo_id = ?2 AND integration_id = ?3"
                    ),
                    rusqlite::params![commit_sha, repo_id, integration_id],
                    ScmCommit::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &CommitsFilter) -> EngineResult<DbListResponse<ScmCommit>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.committed_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, ScmCommit::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &CommitsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &CommitsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, COMMITS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        common::bulk_delete(&self.db, tenant, COMMITS_TABLE, ids)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(COMMITS_TABLE))
    }

    fn aggregation(&self, tenant: &Tenant, filter: &CommitsFilter) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
        let request = GroupRequest {
            across: filter.across,
            stacks: &filter.stacks,
            calculation: filter.calculation.unwrap_or_default(),
            interval: filter.agg_interval,
            sort: &filter.sort,
            page: filter.page,
            page_size: filter.page_size,
        };
        let conditions = self.conditions(tenant, filter)?;
        let query = request.build(self.from(tenant), conditions, self.db.limits())?;
        Ok((query, request.stack_keys()?))
    }

    fn conditions(&self, tenant: &Tenant, filter: &CommitsFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.repo_id", &filter.repo_ids)
            .none_of("t.repo_id", &filter.exclude_repo_ids)
            .identity_one_of("t.author_id", &filter.authors)
            .identity_none_of("t.author_id", &filter.exclude_authors)
            .identity_one_of("t.committer_id", &filter.committers)
            .identity_none_of("t.committer_id", &filter.exclude_committers)
            .one_of("t.commit_sha", &filter.commit_shas)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.committed_at", filter.committed_at.as_ref());
        Ok(conditions)
    }
}

impl DatabaseService for ScmCommitService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{COMMITS_TABLE} (
                id TEXT PRIMARY KEY,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                message TEXT,
                author TEXT,
                author_id TEXT,
                committer TEXT,
                committer_id TEXT,
                additions INTEGER,
                deletions INTEGER,
                files_changed INTEGER,
                committed_at INTEGER,
                created_at INTEGER NOT NULL,
                CONSTRAINT uniq_scm_commits_sha UNIQUE (commit_sha, repo_id, integration_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_scm_commits_committed
                ON {COMMITS_TABLE} (committed_at);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
