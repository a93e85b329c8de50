use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::domain::common::{self, Calculation, Dimension, GroupRequest};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::aggregation::UNKNOWN;
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{
    AggregationQuery, AggregationResult, Conditions, GroupKey, Measure, Page, SortingOrder, TimeRange,
    ValueFilter,
};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::{AggInterval, now_epoch_seconds};
use crate::shared::response::DbListResponse;

pub const BUILD_BATCHES_TABLE: &str = "awsdevtools_build_batches";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("build_batch_started_at", "t.build_batch_started_at"),
    ("build_batch_ended_at", "t.build_batch_ended_at"),
];

/// One CodeBuild batch build. Natural key: (build_batch_id, integration_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsBuildBatch {
    #[serde(default)]
    pub id: Option<String>,
    pub build_batch_id: String,
    pub integration_id: String,
    pub arn: String,
    #[serde(default)]
    pub build_batch_number: Option<i64>,
    pub project_name: String,
    pub project_arn: String,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    pub region: String,
    pub status: String,
    #[serde(default)]
    pub last_phase: Option<String>,
    #[serde(default)]
    pub last_phase_status: Option<String>,
    #[serde(default)]
    pub build_batch_complete: Option<bool>,
    #[serde(default)]
    pub source_version: Option<String>,
    #[serde(default)]
    pub resolved_source_version: Option<String>,
    #[serde(default)]
    pub source_location: Option<String>,
    #[serde(default)]
    pub build_batch_started_at: Option<i64>,
    #[serde(default)]
    pub build_batch_ended_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl AwsBuildBatch {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            build_batch_id: row.get("build_batch_id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            arn: row.get("arn")?,
            build_batch_number: row.get("build_batch_number")?,
            project_name: row.get("project_name")?,
            project_arn: row.get("project_arn")?,
            initiator: row.get("initiator")?,
            source_type: row.get("source_type")?,
            region: row.get("region")?,
            status: row.get("status")?,
            last_phase: row.get("last_phase")?,
            last_phase_status: row.get("last_phase_status")?,
            build_batch_complete: row.get("build_batch_complete")?,
            source_version: row.get("source_version")?,
            resolved_source_version: row.get("resolved_source_version")?,
            source_location: row.get("source_location")?,
            build_batch_started_at: row.get("build_batch_started_at")?,
            build_batch_ended_at: row.get("build_batch_ended_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildBatchesAcross {
    ProjectName,
    LastPhase,
    LastPhaseStatus,
    Status,
    SourceType,
    Initiator,
    Region,
    Trend,
}

impl Dimension for BuildBatchesAcross {
    fn name(&self) -> &'static str {
        match self {
            BuildBatchesAcross::ProjectName => "project_name",
            BuildBatchesAcross::LastPhase => "last_phase",
            BuildBatchesAcross::LastPhaseStatus => "last_phase_status",
            BuildBatchesAcross::Status => "status",
            BuildBatchesAcross::SourceType => "source_type",
            BuildBatchesAcross::Initiator => "initiator",
            BuildBatchesAcross::Region => "region",
            BuildBatchesAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            BuildBatchesAcross::Trend => GroupKey::interval("t.build_batch_started_at", interval),
            other => GroupKey::column(format!("t.{}", other.name()), UNKNOWN),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, BuildBatchesAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildBatchesCalculation {
    #[default]
    BuildBatchCount,
    /// Seconds from start to end, or to now while the batch runs.
    Duration,
}

impl Calculation for BuildBatchesCalculation {
    fn name(&self) -> &'static str {
        match self {
            BuildBatchesCalculation::BuildBatchCount => "build_batch_count",
            BuildBatchesCalculation::Duration => "duration",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            BuildBatchesCalculation::BuildBatchCount => Measure::Count,
            BuildBatchesCalculation::Duration => Measure::stats(
                "COALESCE(t.build_batch_ended_at, CAST(strftime('%s', 'now') AS INTEGER)) - t.build_batch_started_at",
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildBatchesFilter {
    pub project_names: ValueFilter<String>,
    pub last_phases: ValueFilter<String>,
    pub last_phase_statuses: ValueFilter<String>,
    pub statuses: ValueFilter<String>,
    pub source_types: ValueFilter<String>,
    pub initiators: ValueFilter<String>,
    pub regions: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub build_batch_started_at: Option<TimeRange>,
    pub across: Option<BuildBatchesAcross>,
    pub stacks: Vec<BuildBatchesAcross>,
    pub calculation: Option<BuildBatchesCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct BuildBatchService {
    db: Database,
}

impl BuildBatchService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a batch or refreshes the stored one with the same
    /// (build_batch_id, integration_id). Returns the internal id.
    pub fn insert(&self, tenant: &Tenant, batch: &AwsBuildBatch) -> EngineResult<String> {
        let integration_id = parse_integration_id(&batch.integration_id)?;
        let table = tenant.table(BUILD_BATCHES_TABLE);
        let now = now_epoch_seconds();
        let sql = format!(
            "INSERT INTO {table} (id, build_batch_id, integration_id, arn, build_batch_number, \
                build_batch_started_at, build_batch_ended_at, build_batch_complete, last_phase, last_phase_status, \
                status, project_name, project_arn, initiator, source_version, resolved_source_version, source_type, \
                source_location, region, created_at, updated_at) \
             VALUES (:id, :build_batch_id, :integration_id, :arn, :number, :started, :ended, :complete, \
                :last_phase, :last_phase_status, :status, :project_name, :project_arn, :initiator, :source_version, \
                :resolved_source_version, :source_type, :source_location, :region, :created_at, :now) \
             ON CONFLICT (build_batch_id, integration_id) DO UPDATE SET \
                arn = excluded.arn, \
                build_batch_started_at = COALESCE(excluded.build_batch_started_at, build_batch_started_at), \
                build_batch_ended_at = COALESCE(excluded.build_batch_ended_at, build_batch_ended_at), \
                build_batch_complete = COALESCE(excluded.build_batch_complete, build_batch_complete), \
                last_phase = COALESCE(excluded.last_phase, last_phase), \
                last_phase_status = COALESCE(excluded.last_phase_status, last_phase_status), \
                status = excluded.status, \
                project_name = excluded.project_name, \
                initiator = COALESCE(excluded.initiator, initiator), \
                source_version = COALESCE(excluded.source_version, source_version), \
                resolved_source_version = COALESCE(excluded.resolved_source_version, resolved_source_version), \
                source_type = COALESCE(excluded.source_type, source_type), \
                source_location = COALESCE(excluded.source_location, source_location), \
                region = excluded.region, \
                updated_at = excluded.updated_at \
             RETURNING id"
        );
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &sql,
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":build_batch_id": batch.build_batch_id,
                    ":integration_id": integration_id,
                    ":arn": batch.arn,
                    ":number": batch.build_batch_number,
                    ":started": batch.build_batch_started_at,
                    ":ended": batch.build_batch_ended_at,
                    ":complete": batch.build_batch_complete,
                    ":last_phase": batch.last_phase,
                    ":last_phase_status": batch.last_phase_status,
                    ":status": batch.status,
                    ":project_name": batch.project_name,
                    ":project_arn": batch.project_arn,
                    ":initiator": batch.initiator,
                    ":source_version": batch.source_version,
                    ":resolved_source_version": batch.resolved_source_version,
                    ":source_type": batch.source_type,
                    ":source_location": batch.source_location,
                    ":region": batch.region,
                    ":created_at": batch.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::builds", tenant = %tenant, build_batch_id = %batch.build_batch_id, id = %id, "Upserted build batch");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<AwsBuildBatch>> {
        let table = tenant.table(BUILD_BATCHES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    AwsBuildBatch::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_build_batch_id(
        &self,
        tenant: &Tenant,
        build_batch_id: &str,
        integration_id: &str,
    ) -> EngineResult<Option<AwsBuildBatch>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(BUILD_BATCHES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE build_batch_id = ?1 AND integration_id = ?2"),
                    rusqlite::params![build_batch_id, integration_id],
                    AwsBuildBatch::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_by_filter(
        &self,
        tenant: &Tenant,
        filter: &BuildBatchesFilter,
    ) -> EngineResult<DbListResponse<AwsBuildBatch>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.build_batch_started_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, AwsBuildBatch::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &BuildBatchesFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &BuildBatchesFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, BUILD_BATCHES_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        let deleted = common::bulk_delete(&self.db, tenant, BUILD_BATCHES_TABLE, ids)?;
        info!(target: "lens_db::builds", tenant = %tenant, requested = ids.len(), deleted, "Bulk deleted build batches");
        Ok(deleted)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(BUILD_BATCHES_TABLE))
    }

    fn aggregation(
        &self,
        tenant: &Tenant,
        filter: &BuildBatchesFilter,
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

    fn conditions(&self, tenant: &Tenant, filter: &BuildBatchesFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.project_name", &filter.project_names)
            .one_of("t.last_phase", &filter.last_phases)
            .one_of("t.last_phase_status", &filter.last_phase_statuses)
            .one_of("t.status", &filter.statuses)
            .one_of("t.source_type", &filter.source_types)
            .one_of("t.initiator", &filter.initiators)
            .one_of("t.region", &filter.regions)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.build_batch_started_at", filter.build_batch_started_at.as_ref());
        Ok(conditions)
    }
}

impl DatabaseService for BuildBatchService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{BUILD_BATCHES_TABLE} (
                id TEXT PRIMARY KEY,
                build_batch_id TEXT NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                arn TEXT NOT NULL,
                build_batch_number INTEGER,
                build_batch_started_at INTEGER,
                build_batch_ended_at INTEGER,
                build_batch_complete INTEGER,
                last_phase TEXT,
                last_phase_status TEXT,
                status TEXT NOT NULL,
                project_name TEXT NOT NULL,
                project_arn TEXT NOT NULL,
                initiator TEXT,
                source_version TEXT,
                resolved_source_version TEXT,
                source_type TEXT,
                source_location TEXT,
                region TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (build_batch_id, integration_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_awsdevtools_build_batches_started
                ON {BUILD_BATCHES_TABLE} (build_batch_started_at);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
