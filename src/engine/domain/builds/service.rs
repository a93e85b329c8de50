use rusqlite::{OptionalExtension, named_params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::domain::builds::model::{AwsBuild, BuildsFilter};
use crate::engine::domain::builds::reports::{load_reports, write_reports};
use crate::engine::domain::common::{self, GroupRequest};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{AggregationQuery, AggregationResult, Conditions, GroupKey, Page, SortingOrder};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::engine::tags::TagItemType;
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const BUILDS_TABLE: &str = "awsdevtools_builds";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("build_started_at", "t.build_started_at"),
    ("build_ended_at", "t.build_ended_at"),
    ("build_number", "t.build_number"),
    ("project_name", "t.project_name"),
    ("status", "t.status"),
];

pub struct BuildService {
    db: Database,
}

impl BuildService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a build or, when (build_id, integration_id) already exists,
    /// refreshes its mutable fields. Optional fields missing from the update
    /// keep their stored value. Reports carried by the build are upserted in
    /// the same transaction. Returns the internal id.
    pub fn insert(&self, tenant: &Tenant, build: &AwsBuild) -> EngineResult<String> {
        let integration_id = parse_integration_id(&build.integration_id)?;
        let table = tenant.table(BUILDS_TABLE);
        let now = now_epoch_seconds();
        let sql = format!(
            "INSERT INTO {table} (id, build_id, integration_id, arn, build_number, build_started_at, build_ended_at, \
                last_phase, last_phase_status, status, build_complete, project_name, project_arn, initiator, \
                build_batch_arn, source_type, source_location, resolved_source_version, region, created_at, updated_at) \
             VALUES (:id, :build_id, :integration_id, :arn, :build_number, :started, :ended, :last_phase, \
                :last_phase_status, :status, :build_complete, :project_name, :project_arn, :initiator, \
                :build_batch_arn, :source_type, :source_location, :resolved_source_version, :region, :created_at, :now) \
             ON CONFLICT (build_id, integration_id) DO UPDATE SET \
                arn = excluded.arn, \
                build_started_at = COALESCE(excluded.build_started_at, build_started_at), \
                build_ended_at = COALESCE(excluded.build_ended_at, build_ended_at), \
                last_phase = COALESCE(excluded.last_phase, last_phase), \
                last_phase_status = COALESCE(excluded.last_phase_status, last_phase_status), \
                status = excluded.status, \
                build_complete = COALESCE(excluded.build_complete, build_complete), \
                project_name = excluded.project_name, \
                initiator = excluded.initiator, \
                build_batch_arn = COALESCE(excluded.build_batch_arn, build_batch_arn), \
                source_type = excluded.source_type, \
                source_location = COALESCE(excluded.source_location, source_location), \
                resolved_source_version = COALESCE(excluded.resolved_source_version, resolved_source_version), \
                region = excluded.region, \
                updated_at = excluded.updated_at \
             RETURNING id"
        );
        let id: String = self.db.with_tenant_tx(tenant, |conn| {
            let id: String = conn.query_row(
                &sql,
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":build_id": build.build_id,
                    ":integration_id": integration_id,
                    ":arn": build.arn,
                    ":build_number": build.build_number,
                    ":started": build.build_started_at,
                    ":ended": build.build_ended_at,
                    ":last_phase": build.last_phase,
                    ":last_phase_status": build.last_phase_status,
                    ":status": build.status,
                    ":build_complete": build.build_complete,
                    ":project_name": build.project_name,
                    ":project_arn": build.project_arn,
                    ":initiator": build.initiator,
                    ":build_batch_arn": build.build_batch_arn,
                    ":source_type": build.source_type,
                    ":source_location": build.source_location,
                    ":resolved_source_version": build.resolved_source_version,
                    ":region": build.region,
                    ":created_at": build.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?;
            write_reports(conn, tenant, &id, integration_id, &build.reports, now)?;
            Ok(id)
        })?;
        debug!(
            target: "lens_db::builds",
            tenant = %tenant,
            build_id = %build.build_id,
            id = %id,
            reports = build.reports.len(),
            "Upserted build"
        );
        Ok(id)
    }

    /// The build with its reports and testcases.
    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<AwsBuild>> {
        let table = tenant.table(BUILDS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let build = conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    AwsBuild::from_row,
                )
                .optional()?;
            let Some(mut build) = build else {
                return Ok(None);
            };
            build.reports = load_reports(conn, tenant, id)?;
            Ok(Some(build))
        })
    }

    pub fn get_by_build_id(
        &self,
        tenant: &Tenant,
        build_id: &str,
        integration_id: &str,
    ) -> EngineResult<Option<AwsBuild>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(BUILDS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE build_id = ?1 AND integration_id = ?2"),
                    rusqlite::params![build_id, integration_id],
                    AwsBuild::from_row,
                )
                .optional()?)
        })
    }

    pub fn list(&self, tenant: &Tenant, page: Option<u32>, page_size: Option<u32>) -> EngineResult<DbListResponse<AwsBuild>> {
        self.list_by_filter(
            tenant,
            &BuildsFilter {
                page,
                page_size,
                ..BuildsFilter::default()
            },
        )
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &BuildsFilter) -> EngineResult<DbListResponse<AwsBuild>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(
            &filter.sort,
            LIST_SORT_COLUMNS,
            ("t.build_started_at", SortingOrder::Desc),
        );
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, AwsBuild::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &BuildsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &BuildsFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, BUILDS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        let deleted = common::bulk_delete(&self.db, tenant, BUILDS_TABLE, ids)?;
        info!(target: "lens_db::builds", tenant = %tenant, requested = ids.len(), deleted, "Bulk deleted builds");
        Ok(deleted)
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!("{} AS t", tenant.table(BUILDS_TABLE))
    }

    fn aggregation(&self, tenant: &Tenant, filter: &BuildsFilter) -> EngineResult<(AggregationQuery, Vec<GroupKey>)> {
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

    fn conditions(&self, tenant: &Tenant, filter: &BuildsFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.project_name", &filter.project_names)
            .one_of("t.last_phase", &filter.last_phases)
            .one_of("t.last_phase_status", &filter.last_phase_statuses)
            .one_of("t.status", &filter.statuses)
            .one_of("t.source_type", &filter.source_types)
            .one_of("t.initiator", &filter.initiators)
            .one_of("t.build_batch_arn", &filter.build_batch_arns)
            .one_of("t.region", &filter.regions)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?)
            .time_range("t.build_started_at", filter.build_started_at.as_ref())
            .tagged("t.id", TagItemType::AwsBuild.as_str(), &filter.tag_ids);
        Ok(conditions)
    }
}

impl DatabaseService for BuildService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{BUILDS_TABLE} (
                id TEXT PRIMARY KEY,
                build_id TEXT NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                arn TEXT NOT NULL,
                build_number INTEGER NOT NULL,
                build_started_at INTEGER,
                build_ended_at INTEGER,
                last_phase TEXT,
                last_phase_status TEXT,
                status TEXT NOT NULL,
                build_complete INTEGER,
                project_name TEXT NOT NULL,
                project_arn TEXT NOT NULL,
                initiator TEXT NOT NULL,
                build_batch_arn TEXT,
                source_type TEXT NOT NULL,
                source_location TEXT,
                resolved_source_version TEXT,
                region TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (build_id, integration_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_awsdevtools_builds_started
                ON {BUILDS_TABLE} (build_started_at);
            CREATE INDEX IF NOT EXISTS {schema}.idx_awsdevtools_builds_project
                ON {BUILDS_TABLE} (project_name);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
