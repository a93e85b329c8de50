use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::engine::domain::cicd::instances::INSTANCES_TABLE;
use crate::engine::domain::cicd::jobs::JOBS_TABLE;
use crate::engine::domain::common::{self, Calculation, Dimension, GroupRequest};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::parse_integration_ids;
use crate::engine::query::aggregation::{UNKNOWN, UNKNOWN_USER};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{
    AggregationQuery, AggregationResult, Conditions, GroupKey, Measure, NumericRange, Page, SortingOrder,
    TimeRange, ValueFilter,
};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::engine::tags::TagItemType;
use crate::shared::datetime::{AggInterval, now_epoch_seconds};
use crate::shared::response::DbListResponse;

pub const JOB_RUNS_TABLE: &str = "cicd_job_runs";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("start_time", "t.start_time"),
    ("end_time", "t.end_time"),
    ("duration", "t.duration"),
    ("job_name", "t.job_name"),
    ("status", "t.status"),
];

/// One execution of a job. Natural key: (cicd_job_id, job_run_number).
///
/// Listing joins in the job and instance so `job_name`, `project_name`,
/// `instance_name` and `integration_id` are populated on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCdJobRun {
    #[serde(default)]
    pub id: Option<String>,
    pub cicd_job_id: String,
    pub job_run_number: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub cicd_user_id: Option<String>,
    #[serde(default)]
    pub params: Option<JsonValue>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
}

impl CiCdJobRun {
    pub fn new(cicd_job_id: &str, job_run_number: i64) -> Self {
        Self {
            id: None,
            cicd_job_id: cicd_job_id.to_string(),
            job_run_number,
            status: None,
            start_time: None,
            end_time: None,
            duration: None,
            cicd_user_id: None,
            params: None,
            job_name: None,
            project_name: None,
            instance_name: None,
            integration_id: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            cicd_job_id: row.get("cicd_job_id")?,
            job_run_number: row.get("job_run_number")?,
            status: row.get("status")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            duration: row.get("duration")?,
            cicd_user_id: row.get("cicd_user_id")?,
            params: row.get("params")?,
            job_name: row.get("job_name")?,
            project_name: row.get("project_name")?,
            instance_name: row.get("instance_name")?,
            integration_id: row
                .get::<_, Option<i64>>("integration_id")?
                .map(|id| id.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunsAcross {
    JobName,
    JobStatus,
    InstanceName,
    CicdUserId,
    ProjectName,
    Trend,
}

impl Dimension for JobRunsAcross {
    fn name(&self) -> &'static str {
        match self {
            JobRunsAcross::JobName => "job_name",
            JobRunsAcross::JobStatus => "job_status",
            JobRunsAcross::InstanceName => "instance_name",
            JobRunsAcross::CicdUserId => "cicd_user_id",
            JobRunsAcross::ProjectName => "project_name",
            JobRunsAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            JobRunsAcross::JobName => GroupKey::column("t.job_name", UNKNOWN),
            JobRunsAcross::JobStatus => GroupKey::column("t.status", UNKNOWN),
            JobRunsAcross::InstanceName => GroupKey::column("t.instance_name", UNKNOWN),
            JobRunsAcross::CicdUserId => GroupKey::column("t.cicd_user_id", UNKNOWN_USER),
            JobRunsAcross::ProjectName => GroupKey::column("t.project_name", UNKNOWN),
            JobRunsAcross::Trend => GroupKey::interval("t.start_time", interval),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, JobRunsAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunsCalculation {
    #[default]
    Count,
    Duration,
}

impl Calculation for JobRunsCalculation {
    fn name(&self) -> &'static str {
        match self {
            JobRunsCalculation::Count => "count",
            JobRunsCalculation::Duration => "duration",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            JobRunsCalculation::Count => Measure::Count,
            JobRunsCalculation::Duration => Measure::stats("t.duration"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRunsFilter {
    pub job_names: ValueFilter<String>,
    pub job_statuses: ValueFilter<String>,
    pub instance_names: ValueFilter<String>,
    pub instance_types: ValueFilter<String>,
    pub project_names: ValueFilter<String>,
    /// Identity ids or `team_id:<uuid>` tokens
    pub cicd_user_ids: ValueFilter<String>,
    pub exclude_cicd_user_ids: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub start_time: Option<TimeRange>,
    pub duration: Option<NumericRange>,
    pub tag_ids: ValueFilter<i64>,
    pub across: Option<JobRunsAcross>,
    pub stacks: Vec<JobRunsAcross>,
    pub calculation: Option<JobRunsCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct CiCdJobRunService {
    db: Database,
}

impl CiCdJobRunService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records a run. Re-ingesting an existing run only touches status,
    /// end time, duration and params, only when the status or end time
    /// actually changed, and never overwrites a value with NULL.
    pub fn insert(&self, tenant: &Tenant, run: &CiCdJobRun) -> EngineResult<String> {
        let table = tenant.table(JOB_RUNS_TABLE);
        let now = now_epoch_seconds();
        let id = self.db.with_tenant(tenant, |conn| {
            let changed: Option<String> = conn
                .query_row(
                    &format!(
                        "INSERT INTO {table} (id, cicd_job_id, job_run_number, status, start_time, end_time, duration, \
                            cicd_user_id, params, created_at, updated_at) \
                         VALUES (:id, :job, :number, :status, :start, :end, :duration, :user, :params, :now, :now) \
                         ON CONFLICT (cicd_job_id, job_run_number) DO UPDATE SET \
                            status = COALESCE(excluded.status, status), \
                            end_time = COALESCE(excluded.end_time, end_time), \
                            duration = COALESCE(excluded.duration, duration), \
                            params = COALESCE(excluded.params, params), \
                            updated_at = excluded.updated_at \
                         WHERE (excluded.status IS NOT NULL AND excluded.status IS NOT status) \
                            OR (excluded.end_time IS NOT NULL AND excluded.end_time IS NOT end_time) \
                         RETURNING id"
                    ),
                    named_params! {
                        ":id": Uuid::new_v4().to_string(),
                        ":job": run.cicd_job_id,
                        ":number": run.job_run_number,
                        ":status": run.status,
                        ":start": run.start_time,
                        ":end": run.end_time,
                        ":duration": run.duration,
                        ":user": run.cicd_user_id,
                        ":params": run.params,
                        ":now": now,
                    },
                    |row| row.get(0),
                )
                .optional()?;
            match changed {
                Some(id) => Ok(id),
                None => Ok(conn.query_row(
                    &format!("SELECT id FROM {table} WHERE cicd_job_id = ?1 AND job_run_number = ?2"),
                    rusqlite::params![run.cicd_job_id, run.job_run_number],
                    |row| row.get(0),
                )?),
            }
        })?;
        debug!(target: "lens_db::cicd", tenant = %tenant, job = %run.cicd_job_id, run = run.job_run_number, "Recorded job run");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<CiCdJobRun>> {
        let from = self.from(tenant);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT t.* FROM {from} WHERE t.id = ?1"),
                    [id],
                    CiCdJobRun::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_run_number(&self, tenant: &Tenant, cicd_job_id: &str, job_run_number: i64) -> EngineResult<Option<CiCdJobRun>> {
        let from = self.from(tenant);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT t.* FROM {from} WHERE t.cicd_job_id = ?1 AND t.job_run_number = ?2"),
                    rusqlite::params![cicd_job_id, job_run_number],
                    CiCdJobRun::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &JobRunsFilter) -> EngineResult<DbListResponse<CiCdJobRun>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.start_time", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, CiCdJobRun::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &JobRunsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &JobRunsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, JOB_RUNS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        common::bulk_delete(&self.db, tenant, JOB_RUNS_TABLE, ids)
    }

    /// Runs joined with their job and instance, aliased `t`.
    fn from(&self, tenant: &Tenant) -> String {
        format!(
            "(SELECT r.*, j.job_name, j.project_name, i.name AS instance_name, i.type AS instance_type, \
                i.integration_id \
             FROM {runs} AS r \
             JOIN {jobs} AS j ON j.id = r.cicd_job_id \
             JOIN {instances} AS i ON i.id = j.cicd_instance_id) AS t",
            runs = tenant.table(JOB_RUNS_TABLE),
            jobs = tenant.table(JOBS_TABLE),
            instances = tenant.table(INSTANCES_TABLE),
        )
    }

    fn aggregation(&self, tenant: &Tenant, filter: &JobRunsFilter) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
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

    fn conditions(&self, tenant: &Tenant, filter: &JobRunsFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.job_name", &filter.job_names)
            .one_of("t.status", &filter.job_statuses)
            .one_of("t.instance_name", &filter.instance_names)
            .one_of("t.instance_type", &filter.instance_types)
            .one_of("t.project_name", &filter.project_names)
            .identity_one_of("t.cicd_user_id", &filter.cicd_user_ids)
            .identity_none_of("t.cicd_user_id", &filter.exclude_cicd_user_ids)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.start_time", filter.start_time.as_ref())
            .numeric_range("t.duration", filter.duration.as_ref())
            .tagged("t.id", TagItemType::CicdJobRun.as_str(), &filter.tag_ids);
        Ok(conditions)
    }
}

impl DatabaseService for CiCdJobRunService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{JOB_RUNS_TABLE} (
                id TEXT PRIMARY KEY,
                cicd_job_id TEXT NOT NULL REFERENCES {JOBS_TABLE}(id) ON DELETE CASCADE,
                job_run_number INTEGER NOT NULL,
                status TEXT,
                start_time INTEGER,
                end_time INTEGER,
                duration INTEGER,
                cicd_user_id TEXT,
                params TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (cicd_job_id, job_run_number)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_cicd_job_runs_start
                ON {JOB_RUNS_TABLE} (start_time);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
