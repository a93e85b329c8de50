use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::engine::domain::common;
use crate::engine::errors::EngineResult;
use crate::engine::integrations::parse_integration_id;
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{Conditions, Page, SortingOrder};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const INSTANCES_TABLE: &str = "cicd_instances";

/// A CI/CD server (Jenkins master, Azure pipelines org, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCdInstance {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default, rename = "type")]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub config: Option<JsonValue>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl CiCdInstance {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name.to_string()),
            url: None,
            integration_id: None,
            instance_type: None,
            config: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            url: row.get("url")?,
            integration_id: row
                .get::<_, Option<i64>>("integration_id")?
                .map(|id| id.to_string()),
            instance_type: row.get("type")?,
            config: row.get("config")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct CiCdInstanceService {
    db: Database,
}

impl CiCdInstanceService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts the instance. Inserting an existing id again refreshes its
    /// name, url and config where the new values are set; the recorded
    /// integration id stays.
    pub fn insert(&self, tenant: &Tenant, instance: &CiCdInstance) -> EngineResult<String> {
        let integration_id = instance
            .integration_id
            .as_deref()
            .map(parse_integration_id)
            .transpose()?;
        let table = tenant.table(INSTANCES_TABLE);
        let now = now_epoch_seconds();
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, name, url, integration_id, type, config, created_at, updated_at) \
                     VALUES (:id, :name, :url, :integration_id, :type, :config, :created_at, :now) \
                     ON CONFLICT (id) DO UPDATE SET \
                        name = COALESCE(excluded.name, name), \
                        url = COALESCE(excluded.url, url), \
                        config = COALESCE(excluded.config, config), \
                        updated_at = excluded.updated_at \
                     RETURNING id"
                ),
                named_params! {
                    ":id": instance.id,
                    ":name": instance.name,
                    ":url": instance.url,
                    ":integration_id": integration_id,
                    ":type": instance.instance_type,
                    ":config": instance.config,
                    ":created_at": instance.created_at.unwrap_or(now),
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::cicd", tenant = %tenant, id = %id, "Inserted CI/CD instance");
        Ok(id)
    }

    /// Creates the instance or refreshes it. A recorded integration id is
    /// never replaced, and fields the caller leaves out keep their value.
    pub fn upsert(&self, tenant: &Tenant, instance: &CiCdInstance) -> EngineResult<String> {
        let integration_id = instance
            .integration_id
            .as_deref()
            .map(parse_integration_id)
            .transpose()?;
        let table = tenant.table(INSTANCES_TABLE);
        let now = now_epoch_seconds();
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, name, url, integration_id, type, config, created_at, updated_at) \
                     VALUES (:id, :name, :url, :integration_id, :type, :config, :now, :now) \
                     ON CONFLICT (id) DO UPDATE SET \
                        name = COALESCE(excluded.name, name), \
                        url = COALESCE(excluded.url, url), \
                        type = COALESCE(excluded.type, type), \
                        config = COALESCE(excluded.config, config), \
                        integration_id = COALESCE(integration_id, excluded.integration_id), \
                        updated_at = excluded.updated_at \
                     RETURNING id"
                ),
                named_params! {
                    ":id": instance.id,
                    ":name": instance.name,
                    ":url": instance.url,
                    ":integration_id": integration_id,
                    ":type": instance.instance_type,
                    ":config": instance.config,
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::cicd", tenant = %tenant, id = %id, "Upserted CI/CD instance");
        Ok(id)
    }

    pub fn update_config(&self, tenant: &Tenant, id: &str, config: &JsonValue) -> EngineResult<bool> {
        let table = tenant.table(INSTANCES_TABLE);
        let updated = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(
                &format!("UPDATE {table} SET config = ?1, updated_at = ?2 WHERE id = ?3"),
                rusqlite::params![config, now_epoch_seconds(), id],
            )?)
        })?;
        Ok(updated > 0)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<CiCdInstance>> {
        let table = tenant.table(INSTANCES_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    CiCdInstance::from_row,
                )
                .optional()?)
        })
    }

    pub fn list(&self, tenant: &Tenant, page: Option<u32>, page_size: Option<u32>) -> EngineResult<DbListResponse<CiCdInstance>> {
        let conditions = Conditions::new(tenant);
        let query = ListQuery {
            from: format!("{} AS t", tenant.table(INSTANCES_TABLE)),
            conditions: &conditions,
            order_by: "t.created_at",
            order: SortingOrder::Desc,
            page: Page::resolve(page, page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, CiCdInstance::from_row))
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, INSTANCES_TABLE, id)
    }
}

impl DatabaseService for CiCdInstanceService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{INSTANCES_TABLE} (
                id TEXT PRIMARY KEY,
                name TEXT,
                url TEXT,
                integration_id INTEGER REFERENCES integrations(id) ON DELETE CASCADE,
                type TEXT,
                config TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
