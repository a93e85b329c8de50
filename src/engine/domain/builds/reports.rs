use rusqlite::{Connection, Row, named_params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::domain::builds::service::BUILDS_TABLE;
use crate::engine::domain::common::{self, Calculation, Dimension, GroupRequest};
use crate::engine::errors::EngineResult;
use crate::engine::integrations::parse_integration_ids;
use crate::engine::query::aggregation::UNKNOWN;
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{
    AggregationQuery, AggregationResult, Conditions, GroupKey, Measure, Page, SortingOrder, ValueFilter,
};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::AggInterval;
use crate::shared::response::DbListResponse;

pub const REPORTS_TABLE: &str = "awsdevtools_reports";
pub const TESTCASES_TABLE: &str = "awsdevtools_testcases";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "t.name"),
    ("status", "t.status"),
    ("duration", "t.duration"),
    ("report_arn", "t.report_arn"),
];

/// Test report produced by a build. Natural key: (arn, integration_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsReport {
    #[serde(default)]
    pub id: Option<String>,
    pub arn: String,
    /// Arn of the build that produced the report.
    pub execution_id: String,
    pub report_type: String,
    #[serde(default)]
    pub report_group_arn: Option<String>,
    #[serde(default)]
    pub report_group_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub report_created_at: Option<i64>,
    #[serde(default)]
    pub report_expired_at: Option<i64>,
    #[serde(default)]
    pub testcases: Vec<AwsTestcase>,
}

impl AwsReport {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            arn: row.get("arn")?,
            execution_id: row.get("execution_id")?,
            report_type: row.get("report_type")?,
            report_group_arn: row.get("report_group_arn")?,
            report_group_name: row.get("report_group_name")?,
            status: row.get("status")?,
            duration: row.get("duration")?,
            report_created_at: row.get("report_created_at")?,
            report_expired_at: row.get("report_expired_at")?,
            testcases: Vec::new(),
        })
    }
}

/// One test case of a report. Natural key: (report_id, name).
///
/// Listing joins in the owning build, so `project_name` and `region` are
/// filled on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsTestcase {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub report_arn: String,
    #[serde(default)]
    pub prefix: Option<String>,
    pub status: String,
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub expired: Option<i64>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl AwsTestcase {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            report_arn: row.get("report_arn")?,
            prefix: row.get("prefix")?,
            status: row.get("status")?,
            duration: row.get("duration")?,
            expired: row.get("expired")?,
            project_name: row.get("project_name")?,
            region: row.get("region")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestcasesAcross {
    ReportArn,
    Status,
    Region,
    ProjectName,
    SourceType,
    Initiator,
    BuildBatchArn,
    Trend,
}

impl Dimension for TestcasesAcross {
    fn name(&self) -> &'static str {
        match self {
            TestcasesAcross::ReportArn => "report_arn",
            TestcasesAcross::Status => "status",
            TestcasesAcross::Region => "region",
            TestcasesAcross::ProjectName => "project_name",
            TestcasesAcross::SourceType => "source_type",
            TestcasesAcross::Initiator => "initiator",
            TestcasesAcross::BuildBatchArn => "build_batch_arn",
            TestcasesAcross::Trend => "trend",
        }
    }

    fn group_key(&self, interval: AggInterval) -> GroupKey {
        match self {
            TestcasesAcross::Trend => GroupKey::interval("t.build_started_at", interval),
            other => GroupKey::column(format!("t.{}", other.name()), UNKNOWN),
        }
    }

    fn is_trend(&self) -> bool {
        matches!(self, TestcasesAcross::Trend)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestcasesCalculation {
    #[default]
    TestcaseCount,
    Duration,
}

impl Calculation for TestcasesCalculation {
    fn name(&self) -> &'static str {
        match self {
            TestcasesCalculation::TestcaseCount => "testcase_count",
            TestcasesCalculation::Duration => "duration",
        }
    }

    fn measure(&self) -> Measure {
        match self {
            TestcasesCalculation::TestcaseCount => Measure::Count,
            TestcasesCalculation::Duration => Measure::stats("t.duration"),
        }
    }
}

/// Testcase filters. Status and report arn apply to the testcase, the rest
/// to the build that ran it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestcasesFilter {
    pub statuses: ValueFilter<String>,
    pub report_arns: ValueFilter<String>,
    pub regions: ValueFilter<String>,
    pub initiators: ValueFilter<String>,
    pub source_types: ValueFilter<String>,
    pub project_names: ValueFilter<String>,
    pub build_batch_arns: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub across: Option<TestcasesAcross>,
    pub stacks: Vec<TestcasesAcross>,
    pub calculation: Option<TestcasesCalculation>,
    pub agg_interval: Option<AggInterval>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Reads over build test reports. Reports are written with their build
/// through [`write_reports`].
pub struct TestcaseService {
    db: Database,
}

impl TestcaseService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &TestcasesFilter) -> EngineResult<DbListResponse<AwsTestcase>> {
        let conditions = self.conditions(tenant, filter)?;
        let (order_by, order) = common::list_sort(&filter.sort, LIST_SORT_COLUMNS, ("t.name", SortingOrder::Asc));
        let query = ListQuery {
            from: self.from(tenant),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, AwsTestcase::from_row))
    }

    pub fn group_by_and_calculate(
        &self,
        tenant: &Tenant,
        filter: &TestcasesFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, _) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::group_by_and_calculate(conn, &query))
    }

    pub fn stacked_group_by(
        &self,
        tenant: &Tenant,
        filter: &TestcasesFilter,
    ) -> EngineResult<DbListResponse<AggregationResult>> {
        let (query, stacks) = self.aggregation(tenant, filter)?;
        self.db
            .with_tenant(tenant, |conn| executor::stacked_group_by(conn, &query, &stacks))
    }

    /// Reports of one build with their testcases.
    pub fn reports_for_build(&self, tenant: &Tenant, build_row_id: &str) -> EngineResult<Vec<AwsReport>> {
        self.db
            .with_tenant(tenant, |conn| load_reports(conn, tenant, build_row_id))
    }

    fn from(&self, tenant: &Tenant) -> String {
        format!(
            "(SELECT c.*, b.project_name, b.region, b.initiator, b.source_type, b.build_batch_arn, \
                b.build_started_at, r.integration_id \
             FROM {testcases} AS c \
             JOIN {reports} AS r ON r.id = c.report_id \
             JOIN {builds} AS b ON b.id = r.build_id) AS t",
            testcases = tenant.table(TESTCASES_TABLE),
            reports = tenant.table(REPORTS_TABLE),
            builds = tenant.table(BUILDS_TABLE),
        )
    }

    fn aggregation(
        &self,
        tenant: &Tenant,
        filter: &TestcasesFilter,
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

    fn conditions(&self, tenant: &Tenant, filter: &TestcasesFilter) -> EngineResult<Conditions> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.status", &filter.statuses)
            .one_of("t.report_arn", &filter.report_arns)
            .one_of("t.region", &filter.regions)
            .one_of("t.initiator", &filter.initiators)
            .one_of("t.source_type", &filter.source_types)
            .one_of("t.project_name", &filter.project_names)
            .one_of("t.build_batch_arn", &filter.build_batch_arns)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?);
        Ok(conditions)
    }
}

/// Upserts the reports of a build. A report that arrives with testcases
/// replaces its stored testcases; one without keeps them.
pub(crate) fn write_reports(
    conn: &Connection,
    tenant: &Tenant,
    build_row_id: &str,
    integration_id: i64,
    reports: &[AwsReport],
    now: i64,
) -> EngineResult<()> {
    let reports_table = tenant.table(REPORTS_TABLE);
    let testcases_table = tenant.table(TESTCASES_TABLE);
    let upsert_report = format!(
        "INSERT INTO {reports_table} (id, arn, integration_id, execution_id, build_id, report_type, \
            report_group_arn, report_group_name, status, duration, report_created_at, report_expired_at, \
            created_at, updated_at) \
         VALUES (:id, :arn, :integration_id, :execution_id, :build_id, :report_type, :report_group_arn, \
            :report_group_name, :status, :duration, :created, :expired, :now, :now) \
         ON CONFLICT (arn, integration_id) DO UPDATE SET \
            execution_id = excluded.execution_id, \
            build_id = excluded.build_id, \
            report_type = excluded.report_type, \
            report_group_arn = excluded.report_group_arn, \
            report_group_name = excluded.report_group_name, \
            status = excluded.status, \
            duration = excluded.duration, \
            report_created_at = excluded.report_created_at, \
            report_expired_at = excluded.report_expired_at, \
            updated_at = excluded.updated_at \
         RETURNING id"
    );
    let insert_testcase = format!(
        "INSERT INTO {testcases_table} (id, name, report_id, report_arn, prefix, status, duration, expired, \
            created_at, updated_at) \
         VALUES (:id, :name, :report_id, :report_arn, :prefix, :status, :duration, :expired, :now, :now) \
         ON CONFLICT (name, report_id) DO UPDATE SET \
            report_arn = excluded.report_arn, \
            prefix = excluded.prefix, \
            status = excluded.status, \
            duration = excluded.duration, \
            expired = excluded.expired"
    );

    for report in reports {
        let report_id: String = conn.query_row(
            &upsert_report,
            named_params! {
                ":id": Uuid::new_v4().to_string(),
                ":arn": report.arn,
                ":integration_id": integration_id,
                ":execution_id": report.execution_id,
                ":build_id": build_row_id,
                ":report_type": report.report_type,
                ":report_group_arn": report.report_group_arn,
                ":report_group_name": report.report_group_name,
                ":status": report.status,
                ":duration": report.duration,
                ":created": report.report_created_at,
                ":expired": report.report_expired_at,
                ":now": now,
            },
            |row| row.get(0),
        )?;

        if report.testcases.is_empty() {
            continue;
        }
        conn.execute(
            &format!("DELETE FROM {testcases_table} WHERE report_id = ?1"),
            [&report_id],
        )?;
        for testcase in &report.testcases {
            conn.execute(
                &insert_testcase,
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":name": testcase.name,
                    ":report_id": report_id,
                    ":report_arn": testcase.report_arn,
                    ":prefix": testcase.prefix,
                    ":status": testcase.status,
                    ":duration": testcase.duration,
                    ":expired": testcase.expired,
                    ":now": now,
                },
            )?;
        }
        debug!(
            target: "lens_db::builds",
            tenant = %tenant,
            report = %report.arn,
            testcases = report.testcases.len(),
            "Replaced report testcases"
        );
    }
    Ok(())
}

pub(crate) fn load_reports(conn: &Connection, tenant: &Tenant, build_row_id: &str) -> EngineResult<Vec<AwsReport>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} WHERE build_id = ?1 ORDER BY arn",
        tenant.table(REPORTS_TABLE)
    ))?;
    let mut reports = stmt
        .query_map([build_row_id], AwsReport::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT c.*, NULL AS project_name, NULL AS region FROM {} AS c WHERE c.report_id = ?1 ORDER BY c.name",
        tenant.table(TESTCASES_TABLE)
    ))?;
    for report in &mut reports {
        if let Some(id) = &report.id {
            report.testcases = stmt
                .query_map([id], AwsTestcase::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
    }
    Ok(reports)
}

impl DatabaseService for TestcaseService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{REPORTS_TABLE} (
                id TEXT PRIMARY KEY,
                arn TEXT NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                execution_id TEXT NOT NULL,
                build_id TEXT NOT NULL REFERENCES {BUILDS_TABLE}(id) ON DELETE CASCADE,
                report_type TEXT NOT NULL,
                report_group_arn TEXT,
                report_group_name TEXT,
                status TEXT,
                duration INTEGER,
                report_created_at INTEGER,
                report_expired_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (arn, integration_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_awsdevtools_reports_build
                ON {REPORTS_TABLE} (build_id);
            CREATE TABLE IF NOT EXISTS {schema}.{TESTCASES_TABLE} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                report_id TEXT NOT NULL REFERENCES {REPORTS_TABLE}(id) ON DELETE CASCADE,
                report_arn TEXT NOT NULL,
                prefix TEXT,
                status TEXT NOT NULL,
                duration INTEGER,
                expired INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (name, report_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_awsdevtools_testcases_report
                ON {TESTCASES_TABLE} (report_id);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
