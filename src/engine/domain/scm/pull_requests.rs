use rusqlite::{Connection, OptionalExtension, Row, named_params};
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
use crate::engine::tags::TagItemType;
use crate::shared::datetime::{AggInterval, now_epoch_seconds};
use crate::shared::response::DbListResponse;

pub const PULL_REQUESTS_TABLE: &str = "scm_pullrequests";
pub const PR_REVIEWS_TABLE: &str = "scm_pr_reviews";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("pr_created_at", "t.pr_created_at"),
    ("pr_merged_at", "t.pr_merged_at"),
    ("number", "t.number"),
    ("repo_id", "t.repo_id"),
    ("state", "t.state"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmReview {
    pub review_id: String,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub reviewer_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<i64>,
}

/// Natural key: (repo_id, number, integration_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmPullRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub integration_id: String,
    pub repo_id: String,
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
    #[serde(default)]
    pub pr_created_at: Option<i64>,
    #[serde(default)]
    pub pr_updated_at: Option<i64>,
    #[serde(default)]
    pub pr_merged_at: Option<i64>,
    #[serde(default)]
    pub pr_closed_at: Option<i64>,
    #[serde(default)]
    pub reviews: Vec<ScmReview>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl ScmPullRequest {
    pub fn new(integration_id: &str, repo_id: &str, number: i64) -> Self {
        Self {
            id: None,
            integration_id: integration_id.to_string(),
            repo_id: repo_id.to_string(),
            number,
            title: None,
            state: None,
            creator: None,
            creator_id: None,
            source_branch: None,
            target_branch: None,
            additions: None,
            deletions: None,
            pr_created_at: None,
            pr_updated_at: None,
            pr_merged_at: None,
            pr_closed_at: None,
            reviews: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Reviews are loaded separately.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            repo_id: row.get("repo_id")?,
            number: row.get("number")?,
            title: row.get("title")?,
            state: row.get("state")?,
            creator: row.get("creator")?,
            creator_id: row.get("creator_id")?,
            source_branch: row.get("source_branch")?,
            target_branch: row.get("target_branch")?,
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            pr_created_at: row.get("pr_created_at")?,
            pr_updated_at: row.get("pr_updated_at")?,
            pr_merged_at: row.get("pr_merged_at")?,
            pr_closed_at: row.get("pr_closed_at")?,
            reviews: Vec::new(),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestsAcross {
    RepoId,
    Creator,
    State,
    SourceBranch,
    TargetBranch,
    Trend,
}

impl Dimension for PullRequestsAcross {
    fn name(&self) -> &'static str {
        match self {
            PullRequestsAcross::RepoId => "repo_id",
            PullRequestsAcross::Creator => "creator",
            PullRequestsAcross::State => "state",
            PullRequestsAcross::SourceBranch => "source_branch",
            PullRequestsAcross::TargetBranch => "target_branch",
            PullRequestsAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            PullRequestsAcross::Creator => GroupKey::column("t.creator_id", UNKNOWN_USER),
            PullRequestsAcross::Trend => GroupKey::interval("t.pr_created_at", interval),
            other => GroupKey::column(format!("t.{}", other.name()), UNKNOWN),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, PullRequestsAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestsCalculation {
    #[default]
    Count,
    /// Seconds from creation to merge; unmerged PRs are skipped.
    MergeTime,
}

impl Calculation for PullRequestsCalculation {
    fn name(&self) -> &'static str {
        match self {
            PullRequestsCalculation::Count => "count",
            PullRequestsCalculation::MergeTime => "merge_time",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            PullRequestsCalculation::Count => Measure::Count,
            PullRequestsCalculation::MergeTime => Measure::stats("t.pr_merged_at - t.pr_created_at"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestsFilter {
    pub repo_ids: ValueFilter<String>,
    pub exclude_repo_ids: ValueFilter<String>,
    pub states: ValueFilter<String>,
    pub creators: ValueFilter<String>,
    pub exclude_creators: ValueFilter<String>,
    /// PRs with at least one review by these identities
    pub reviewers: ValueFilter<String>,
    pub source_branches: ValueFilter<String>,
    pub target_branches: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub pr_created_at: Option<TimeRange>,
    pub tag_ids: ValueFilter<i64>,
    pub across: Option<PullRequestsAcross>,
    pub stacks: Vec<PullRequestsAcross>,
    pub calculation: Option<PullRequestsCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ScmPullRequestService {
    db: Database,
}

impl ScmPullRequestService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upserts the pull request and its reviews in one transaction.
    pub fn upsert(&self, tenant: &Tenant, pr: &ScmPullRequest) -> EngineResult<String> {
        let integration_id = parse_integration_id(&pr.integration_id)?;
        let table = tenant.table(PULL_REQUESTS_TABLE);
        let reviews = tenant.table(PR_REVIEWS_TABLE);
        let now = now_epoch_seconds();
        let id = self.db.with_tenant_tx(tenant, |conn| {
            let id: String = conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, integration_id, repo_id, number, title, state, creator, creator_id, \
                        source_branch, target_branch, additions, deletions, pr_created_at, pr_updated_at, \
                        pr_merged_at, pr_closed_at, created_at, updated_at) \
                     VALUES (:id, :integration_id, :repo_id, :number, :title, :state, :creator, :creator_id, \
                        :source_branch, :target_branch, :additions, :deletions, :created, :updated, :merged, \
                        :closed, :created_at, :now) \
                     ON CONFLICT (repo_id, number, integration_id) DO UPDATE SET \
                        title = COALESCE(excluded.title, title), \
                        state = COALESCE(excluded.state, state), \
                        creator = COALESCE(excluded.creator, creator), \
                        creator_id = COALESCE(excluded.creator_id, creator_id), \
                        source_branch = COALESCE(excluded.source_branch, source_branch), \
                        target_branch = COALESCE(excluded.target_branch, target_branch), \
                        additions = COALESCE(excluded.additions, additions), \
                        deletions = COALESCE(excluded.deletions, deletions), \
                        pr_updated_at = COALESCE(excluded.pr_updated_at, pr_updated_at), \
                        pr_merged_at = COALESCE(excluded.pr_merged_at, pr_merged_at), \
                        pr_closed_at = COALESCE(excluded.pr_closed_at, pr_closed_at), \
                        updated_at = excluded.updated_at \
                     RETURNING id"
                ),
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":integration_id": integration_id,
                    ":repo_id": pr.repo_id,
                    ":number": pr.number,
                    ":title": pr.title,
                    ":state": pr.state,
                    ":creator": pr.creator,
                    ":creator_id": pr.creator_id,
                    ":source_branch": pr.source_branch,
                    ":target_branch": pr.target_branch,
                    ":additions": pr.additions,
                    ":deletions": pr.deletions,
                    ":created": pr.pr_created_at,
                    ":updated": pr.pr_updated_at,
                    ":merged": pr.pr_merged_at,
                    ":closed": pr.pr_closed_at,
                    ":created_at": pr.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "INSERT INTO {reviews} (id, pr_id, review_id, reviewer, reviewer_id, state, submitted_at) \
                 VALUES (:id, :pr_id, :review_id, :reviewer, :reviewer_id, :state, :submitted_at) \
                 ON CONFLICT (pr_id, review_id) DO UPDATE SET \
                    reviewer = COALESCE(excluded.reviewer, reviewer), \
                    reviewer_id = COALESCE(excluded.reviewer_id, reviewer_id), \
                    state = COALESCE(excluded.state, state), \
                    submitted_at = COALESCE(excluded.submitted_at, submitted_at)"
            ))?;
            for review in &pr.reviews {
                stmt.execute(named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":pr_id": id,
                    ":review_id": review.review_id,
                    ":reviewer": review.reviewer,
                    ":reviewer_id": review.reviewer_id,
                    ":state": review.state,
                    ":submitted_at": review.submitted_at,
                })?;
            }
            Ok(id)
        })?;
        debug!(target: "lens_db::scm", tenant = %tenant, repo = %pr.repo_id, number = pr.number, reviews = pr.reviews.len(), "Upserted pull request");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<ScmPullRequest>> {
        let table = tenant.table(PULL_REQUESTS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let pr = conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    ScmPullRequest::from_row,
                )
                .optional()?;
            pr.map(|pr| with_reviews(conn, tenant, pr)).transpose()
        })
    }

    pub fn get_by_number(
        &self,
        tenant: &Tenant,
        integration_id: &str,
        repo_id: &str,
        number: i64,
    ) -> EngineResult<Option<ScmPullRequest>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(PULL_REQUESTS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let pr = conn
                .query_row(
                    &format!(
                        "SELECT * FROM {table} WHERE repo_id = ?1 AND number = ?2 AND integration_id = ?3"
                    ),
                    rusqlite::params![repo_id, number, integration_id],
                    ScmPullRequest::from_row,
                )
                .optional()?;
            pr.map(|pr| with_reviews(conn, tenant, pr)).transpose()
        })
    }

    pub fn list_by_filter(
        &self,
        tenant: &Tenant,
        filter: &PullRequestsFilter,
    ) -> EngineResult<DbListResponse<ScmPullRequest>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.pr_created_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, ScmPullRequest::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &PullRequestsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &PullRequestsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    /// Deleting a pull request drops its reviews as well.
    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, PULL_REQUESTS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        common::bulk_delete(&self.db, tenant, PULL_REQUESTS_TABLE, ids)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(PULL_REQUESTS_TABLE))
    }

    fn aggregation(
        &self,
        tenant: &Tenant,
        filter: &PullRequestsFilter,
    ) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
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

    fn conditions(&self, tenant: &Tenant, filter: &PullRequestsFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.repo_id", &filter.repo_ids)
            .none_of("t.repo_id", &filter.exclude_repo_ids)
            .one_of("t.state", &filter.states)
            .identity_one_of("t.creator_id", &filter.creators)
            .identity_none_of("t.creator_id", &filter.exclude_creators)
            .identity_through("t.id", PR_REVIEWS_TABLE, "pr_id", "reviewer_id", &filter.reviewers)
            .one_of("t.source_branch", &filter.source_branches)
            .one_of("t.target_branch", &filter.target_branches)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.pr_created_at", filter.pr_created_at.as_ref())
            .tagged("t.id", TagItemType::ScmPullRequest.as_str(), &filter.tag_ids);
        Ok(conditions)
    }
}

fn with_reviews(conn: &Connection, tenant: &Tenant, mut pr: ScmPullRequest) -> EngineResult<ScmPullRequest> {
    let Some(id) = pr.id.as_deref() else {
        return Ok(pr);
    };
    let table = tenant.table(PR_REVIEWS_TABLE);
    let mut stmt = conn.prepare(&format!(
        "SELECT review_id, reviewer, reviewer_id, state, submitted_at FROM {table} \
         WHERE pr_id = ?1 ORDER BY submitted_at ASC, review_id ASC"
    ))?;
    pr.reviews = stmt
        .query_map([id], |row| {
            Ok(ScmReview {
                review_id: row.get(0)?,
                reviewer: row.get(1)?,
                reviewer_id: row.get(2)?,
                state: row.get(3)?,
                submitted_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pr)
}

impl DatabaseService for ScmPullRequestService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{PULL_REQUESTS_TABLE} (
                id TEXT PRIMARY KEY,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                repo_id TEXT NOT NULL,
                number INTEGER NOT NULL,
                title TEXT,
                state TEXT,
                creator TEXT,
                creator_id TEXT,
                source_branch TEXT,
                target_branch TEXT,
                additions INTEGER,
                deletions INTEGER,
                pr_created_at INTEGER,
                pr_updated_at INTEGER,
                pr_merged_at INTEGER,
                pr_closed_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CONSTRAINT uniq_scm_pullrequests_number UNIQUE (repo_id, number, integration_id)
            );
            CREATE TABLE IF NOT EXISTS {schema}.{PR_REVIEWS_TABLE} (
                id TEXT PRIMARY KEY,
                pr_id TEXT NOT NULL REFERENCES {PULL_REQUESTS_TABLE}(id) ON DELETE CASCADE,
                review_id TEXT NOT NULL,
                reviewer TEXT,
                reviewer_id TEXT,
                state TEXT,
                submitted_at INTEGER,
                UNIQUE (pr_id, review_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_scm_pullrequests_created
                ON {PULL_REQUESTS_TABLE} (pr_created_at);
            CREATE INDEX IF NOT EXISTS {schema}.idx_scm_pr_reviews_reviewer
                ON {PR_REVIEWS_TABLE} (reviewer_id);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
