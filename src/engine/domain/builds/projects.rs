use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::domain::common;
use crate::engine::errors::EngineResult;
use crate::engine::integrations::{parse_integration_id, parse_integration_ids};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::sort::SortMap;
use crate::engine::query::{Conditions, Page, SortingOrder, ValueFilter};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const PROJECTS_TABLE: &str = "awsdevtools_projects";

const LIST_SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "t.name"),
    ("project_created_at", "t.project_created_at"),
    ("project_modified_at", "t.project_modified_at"),
];

/// A CodeBuild project. Natural key: (arn, integration_id). Builds and
/// batches point at it through `project_arn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsProject {
    #[serde(default)]
    pub id: Option<String>,
    pub arn: String,
    pub integration_id: String,
    pub name: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_location: Option<String>,
    pub region: String,
    #[serde(default)]
    pub project_created_at: Option<i64>,
    #[serde(default)]
    pub project_modified_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl AwsProject {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            arn: row.get("arn")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            name: row.get("name")?,
            source_type: row.get("source_type")?,
            source_location: row.get("source_location")?,
            region: row.get("region")?,
            project_created_at: row.get("project_created_at")?,
            project_modified_at: row.get("project_modified_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsFilter {
    pub names: ValueFilter<String>,
    pub source_types: ValueFilter<String>,
    pub regions: ValueFilter<String>,
    pub integration_ids: ValueFilter<String>,
    pub sort: SortMap,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ProjectService {
    db: Database,
}

impl ProjectService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts the project or refreshes the one with the same
    /// (arn, integration_id). Returns the internal id.
    pub fn upsert(&self, tenant: &Tenant, project: &AwsProject) -> EngineResult<String> {
        let integration_id = parse_integration_id(&project.integration_id)?;
        let table = tenant.table(PROJECTS_TABLE);
        let now = now_epoch_seconds();
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, arn, integration_id, name, source_type, source_location, region, \
                        project_created_at, project_modified_at, created_at, updated_at) \
                     VALUES (:id, :arn, :integration_id, :name, :source_type, :source_location, :region, \
                        :project_created_at, :project_modified_at, :created_at, :now) \
                     ON CONFLICT (arn, integration_id) DO UPDATE SET \
                        name = excluded.name, \
                        source_type = COALESCE(excluded.source_type, source_type), \
                        source_location = COALESCE(excluded.source_location, source_location), \
                        region = excluded.region, \
                        project_modified_at = COALESCE(excluded.project_modified_at, project_modified_at), \
                        updated_at = excluded.updated_at \
                     RETURNING id"
                ),
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":arn": project.arn,
                    ":integration_id": integration_id,
                    ":name": project.name,
                    ":source_type": project.source_type,
                    ":source_location": project.source_location,
                    ":region": project.region,
                    ":project_created_at": project.project_created_at,
                    ":project_modified_at": project.project_modified_at,
                    ":created_at": project.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::builds", tenant = %tenant, project = %project.name, id = %id, "Upserted project");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<AwsProject>> {
        let table = tenant.table(PROJECTS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    AwsProject::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_arn(&self, tenant: &Tenant, arn: &str, integration_id: &str) -> EngineResult<Option<AwsProject>> {
        let integration_id = parse_integration_id(integration_id)?;
        let table = tenant.table(PROJECTS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE arn = ?1 AND integration_id = ?2"),
                    rusqlite::params![arn, integration_id],
                    AwsProject::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_by_filter(&self, tenant: &Tenant, filter: &ProjectsFilter) -> EngineResult<DbListResponse<AwsProject>> {
        let mut conditions = Conditions::new(tenant);
        conditions
            .one_of("t.name", &filter.names)
            .one_of("t.source_type", &filter.source_types)
            .one_of("t.region", &filter.regions)
            .one_of("t.integration_id", &parse_integration_ids(&filter.integration_ids)?);
        let (order_by, order) = common::list_sort(&filter.sort, LIST_SORT_COLUMNS, ("t.name", SortingOrder::Asc));
        let query = ListQuery {
            from: format!("{} AS t", tenant.table(PROJECTS_TABLE)),
            conditions: &conditions,
            order_by,
            order,
            page: Page::resolve(filter.page, filter.page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, AwsProject::from_row))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, PROJECTS_TABLE, id)
    }

    pub fn bulk_delete(&self, tenant: &Tenant, ids: &[String]) -> EngineResult<usize> {
        common::bulk_delete(&self.db, tenant, PROJECTS_TABLE, ids)
    }
}

impl DatabaseService for ProjectService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{PROJECTS_TABLE} (
                id TEXT PRIMARY KEY,
                arn TEXT NOT NULL,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                source_type TEXT,
                source_location TEXT,
                region TEXT NOT NULL,
                project_created_at INTEGER,
                project_modified_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (arn, integration_id)
            );"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
