use rusqlite::{OptionalExtension, named_params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::domain::common::{self, Dimension, GroupRequest};
use crate::engine::domain::jira::model::{JiraCalculation, JiraFilter, JiraIssue};
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{
    AggregationQuery, AggregationResult, Conditions, GroupKey, Page, SnapshotDedup, SortingOrder,
};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::engine::tags::TagItemType;
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const JIRA_ISSUES_TABLE: &str = "jira_issues";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("issue_created_at", "t.issue_created_at"),
    ("issue_resolved_at", "t.issue_resolved_at"),
    ("issue_key", "t.issue_key"),
    ("status", "t.status"),
    ("priority", "t.priority"),
    ("story_points", "t.story_points"),
];

pub struct JiraIssueService {
    db: Database,
}

impl JiraIssueService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Writes one snapshot. Re-ingesting the same snapshot refreshes its
    /// fields without erasing values the new payload leaves out.
    pub fn upsert(&self, tenant: &Tenant, issue: &JiraIssue) -> EngineResult<String> {
        let integration_id = parse_integration_id(&issue.integration_id)?;
        let table = tenant.table(JIRA_ISSUES_TABLE);
        let now = now_epoch_seconds();
        let sql = format!(
            "INSERT INTO {table} (id, issue_key, integration_id, ingested_at, project, summary, issue_type, priority, \
                status, assignee, assignee_id, reporter, reporter_id, story_points, issue_created_at, issue_updated_at, \
                issue_resolved_at, first_comment_at, created_at, updated_at) \
             VALUES (:id, :key, :integration_id, :ingested_at, :project, :summary, :issue_type, :priority, :status, \
                :assignee, :assignee_id, :reporter, :reporter_id, :story_points, :created, :updated, :resolved, \
                :first_comment, :created_at, :now) \
             ON CONFLICT (issue_key, integration_id, ingested_at) DO UPDATE SET \
                project = COALESCE(excluded.project, project), \
                summary = COALESCE(excluded.summary, summary), \
                issue_type = COALESCE(excluded.issue_type, issue_type), \
                priority = COALESCE(excluded.priority, priority), \
                status = COALESCE(excluded.status, status), \
                assignee = COALESCE(excluded.assignee, assignee), \
                assignee_id = COALESCE(excluded.assignee_id, assignee_id), \
                reporter = COALESCE(excluded.reporter, reporter), \
                reporter_id = COALESCE(excluded.reporter_id, reporter_id), \
                story_points = COALESCE(excluded.story_points, story_points), \
                issue_updated_at = COALESCE(excluded.issue_updated_at, issue_updated_at), \
                issue_resolved_at = COALESCE(excluded.issue_resolved_at, issue_resolved_at), \
                first_comment_at = COALESCE(excluded.first_comment_at, first_comment_at), \
                updated_at = excluded.updated_at \
             RETURNING id"
        );
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &sql,
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":key": issue.issue_key,
                    ":integration_id": integration_id,
                    ":ingested_at": issue.ingested_at,
                    ":project": issue.project,
                    ":summary": issue.summary,
                    ":issue_type": issue.issue_type,
                    ":priority": issue.priority,
                    ":status": issue.status,
                    ":assignee": issue.assignee,
                    ":assignee_id": issue.assignee_id,
                    ":reporter": issue.reporter,
                    ":reporter_id": issue.reporter_id,
                    ":story_points": issue.story_points,
                    ":created": issue.issue_created_at,
                    ":updated": issue.issue_updated_at,
                    ":resolved": issue.issue_resolved_at,
                    ":first_comment": issue.first_comment_at,
                    ":created_at": issue.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::jira", tenant = %tenant, issue = %issue.issue_key, ingested_at = issue.ingested_at, "Upserted issue snapshot");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<JiraIssue>> {
        let table = tenant.table(JIRA_ISSUES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    JiraIssue::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_key(
        &self,
        tenant: &Tenant,
        issue_key: &str,
        integration_id: &str,
        ingested_at: i64,
    ) -> EngineResult<Option<JiraIssue>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(JIRA_ISSUES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT * FROM {table} WHERE issue_key = ?1 AND integration_id = ?2 AND ingested_at = ?3"
                    ),
                    rusqlite::params![issue_key, integration_id, ingested_at],
                    JiraIssue::from_row,
                )
                .optional()?)
        })
    }

    /// Distinct snapshot times, newest first.
    pub fn ingested_at_values(&self, tenant: &Tenant, integration_id: &str) -> EngineResult<Vec<i64>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(JIRA_ISSUES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT ingested_at FROM {table} WHERE integration_id = ?1 ORDER BY ingested_at DESC"
            ))?;
            let values = stmt
                .query_map([integration_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(values)
        })
    }

    pub fn list(&self, tenant: &Tenant, page: Option<u32>, page_size: Option<u32>) -> EngineResult<DbListResponse<JiraIssue>> {
        self.list_by_filter(
            tenant,
            &JiraFilter {
                page,
                page_size,
                ..JiraFilter::default()
            },
        )
    }

    /// Issues of the latest snapshot, or of the pinned `ingested_at`.
    pub fn list_by_filter(&self, tenant: &Tenant, filter: &JiraFilter) -> EngineResult<DbListResponse<JiraIssue>> {
        let mut conditions = self.conditions(tenant, filter)?;
        common::snapshot(&mut conditions, JIRA_ISSUES_TABLE, filter.ingested_at);
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.issue_created_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, JiraIssue::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &JiraFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &JiraFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, JIRA_ISSUES_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        let deleted = common::bulk_delete(&self.db, tenant, JIRA_ISSUES_TABLE, ids)?;
        info!(target: "lens_db::jira", tenant = %tenant, requested = ids.len(), deleted, "Bulk deleted issue snapshots");
        Ok(deleted)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(JIRA_ISSUES_TABLE))
    }

    /// Trend queries read the whole snapshot history and keep the newest
    /// snapshot of each issue per bucket; every other dimension reads a
    /// single snapshot.
    fn aggregation(&self, tenant: &Tenant, filter: &JiraFilter) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
        let request = GroupRequest {
            across: filter.across,
            stacks: &filter.stacks,
            calculation: filter.calculation.unwrap_or_default(),
            interval: filter.agg_interval,
            sort: &filter.sort,
            page: filter.page,
            page_size: filter.page_size,
        };
        let across = request.across()?;
        if request.calculation == JiraCalculation::Age && !across.is_trend() {
            return Err(EngineError::validation(format!(
                "Calculation age is not supported across {}",
                across.name()
            )));
        }

        let mut conditions = self.conditions(tenant, filter)?;
        let dedup = if across.is_trend() {
            if let Some(ts) = filter.ingested_at {
                conditions.eq("t.ingested_at", ts);
            }
            Some(SnapshotDedup {
                bucket: across.group_key(request.interval()).key_sql(),
                partition: vec!["t.integration_id".to_string(), "t.issue_key".to_string()],
                latest_by: "t.ingested_at".to_string(),
            })
        } else {
            common::snapshot(&mut conditions, JIRA_ISSUES_TABLE, filter.ingested_at);
            None
        };

        let query = request
            .build(self.from(tenant), conditions, self.db.limits())?
            .with_dedup(dedup);
        Ok((query, request.stack_keys()?))
    }

    fn conditions(&self, tenant: &Tenant, filter: &JiraFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.issue_key", &filter.keys)
            .one_of("t.project", &filter.projects)
            .one_of("t.status", &filter.statuses)
            .one_of("t.issue_type", &filter.issue_types)
            .one_of("t.priority", &filter.priorities)
            .identity_one_of("t.assignee_id", &filter.assignees)
            .identity_one_of("t.reporter_id", &filter.reporters)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.issue_created_at", filter.issue_created_at.as_ref())
            .numeric_range("t.story_points", filter.story_points.as_ref())
            .tagged("t.id", TagItemType::JiraIssue.as_str(), &filter.tag_ids);
        Ok(conditions)
    }
}

impl DatabaseService for JiraIssueService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{JIRA_ISSUES_TABLE} (
                id TEXT PRIMARY KEY,
                issue_key TEXT NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                ingested_at INTEGER NOT NULL,
                project TEXT,
                summary TEXT,
                issue_type TEXT,
                priority TEXT,
                status TEXT,
                assignee TEXT,
                assignee_id TEXT,
                reporter TEXT,
                reporter_id TEXT,
                story_points REAL,
                issue_created_at INTEGER,
                issue_updated_at INTEGER,
                issue_resolved_at INTEGER,
                first_comment_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CONSTRAINT uniq_jira_issues_snapshot UNIQUE (issue_key, integration_id, ingested_at)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_jira_issues_ingested
                ON {JIRA_ISSUES_TABLE} (integration_id, ingested_at);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
