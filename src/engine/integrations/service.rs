use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{Conditions, Page, SortingOrder, ValueFilter};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const INTEGRATIONS_TABLE: &str = "integrations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub application: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

fn default_status() -> String {
    "active".to_string()
}

impl Integration {
    pub fn new(name: &str, application: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            application: application.to_string(),
            url: None,
            status: default_status(),
            created_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get::<_, i64>("id")?.to_string()),
            name: row.get("name")?,
            application: row.get("application")?,
            url: row.get("url")?,
            status: row.get("status")?,
            created_at: Some(row.get("created_at")?),
        })
    }
}

/// Integration ids travel as strings and are stored as integers.
pub fn parse_integration_id(raw: &str) -> EngineResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| EngineError::validation(format!("Invalid integration id '{raw}'")))
}

pub fn parse_integration_ids(filter: &ValueFilter<String>) -> EngineResult<ValueFilter<i64>> {
    match filter {
        ValueFilter::Unfiltered => Ok(ValueFilter::Unfiltered),
        ValueFilter::OneOf(ids) => ids
            .iter()
            .map(|id| parse_integration_id(id))
            .collect::<EngineResult<Vec<_>>>()
            .map(ValueFilter::OneOf),
    }
}

pub struct IntegrationService {
    db: Database,
}

impl IntegrationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, tenant: &Tenant, integration: &Integration) -> EngineResult<String> {
        let table = tenant.table(INTEGRATIONS_TABLE);
        let id: i64 = self.db.with_tenant(tenant, |conn| {
            let sql = format!(
                "INSERT INTO {table} (name, application, url, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id"
            );
            Ok(conn.query_row(
                &sql,
                params![
                    integration.name,
                    integration.application,
                    integration.url,
                    integration.status,
                    integration.created_at.unwrap_or_else(now_epoch_seconds),
                ],
                |row| row.get(0),
            )?)
        })?;
        info!(target: "lens_db::integrations", tenant = %tenant, id, application = %integration.application, "Integration created");
        Ok(id.to_string())
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<Integration>> {
        let Ok(id) = parse_integration_id(id) else {
            return Ok(None);
        };
        let table = tenant.table(INTEGRATIONS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    Integration::from_row,
                )
                .optional()?)
        })
    }

    pub fn list(&self, tenant: &Tenant, page: Option<u32>, page_size: Option<u32>) -> EngineResult<DbListResponse<Integration>> {
        let conditions = Conditions::new(tenant);
        let query = ListQuery {
            from: format!("{} AS t", tenant.table(INTEGRATIONS_TABLE)),
            conditions: &conditions,
            order_by: "t.id",
            order: SortingOrder::Asc,
            page: Page::resolve(page, page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, Integration::from_row))
    }

    /// Removing an integration cascades to every row ingested through it.
    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        let id = parse_integration_id(id)?;
        let table = tenant.table(INTEGRATIONS_TABLE);
        let deleted = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?)
        })?;
        Ok(deleted > 0)
    }
}

impl DatabaseService for IntegrationService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{INTEGRATIONS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                application TEXT NOT NULL,
                url TEXT,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                CONSTRAINT uniq_integrations_name UNIQUE (name)
            );"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
