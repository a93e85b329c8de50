use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::errors::EngineResult;
use crate::engine::integrations::parse_integration_id;
use crate::engine::query::executor::{self, ListQuery};
use crate::engine::query::{Conditions, Page, SortingOrder, ValueFilter};
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;
use crate::shared::response::DbListResponse;

pub const USERS_TABLE: &str = "integration_users";

/// External identity (cloud id / display name) registered under an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbUser {
    #[serde(default)]
    pub id: Option<String>,
    pub integration_id: String,
    pub cloud_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl DbUser {
    pub fn new(integration_id: &str, cloud_id: &str, display_name: &str) -> Self {
        Self {
            id: None,
            integration_id: integration_id.to_string(),
            cloud_id: cloud_id.to_string(),
            display_name: display_name.to_string(),
            email: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            integration_id: row.get::<_, i64>("integration_id")?.to_string(),
            cloud_id: row.get("cloud_id")?,
            display_name: row.get("display_name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Resolves an external handle to the stable internal identity used in
/// filters and aggregation keys.
pub trait IdentityResolver {
    /// Internal id for the identity, registering it on first sight.
    fn resolve(&self, integration_id: &str, cloud_id: &str, display_name: &str) -> EngineResult<String>;
}

pub struct UserIdentityService {
    db: Database,
}

impl UserIdentityService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or refreshes the identity keyed by (integration, cloud id) and
    /// returns its internal id. The id never changes once assigned and a
    /// missing email does not erase a known one.
    pub fn upsert(&self, tenant: &Tenant, user: &DbUser) -> EngineResult<String> {
        let integration_id = parse_integration_id(&user.integration_id)?;
        let table = tenant.table(USERS_TABLE);
        let now = now_epoch_seconds();
        let sql = format!(
            "INSERT INTO {table} (id, integration_id, cloud_id, display_name, email, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             ON CONFLICT (integration_id, cloud_id) DO UPDATE SET \
                display_name = excluded.display_name, \
                email = COALESCE(excluded.email, email), \
                updated_at = excluded.updated_at \
             RETURNING id"
        );
        let id: String = self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &sql,
                params![
                    Uuid::new_v4().to_string(),
                    integration_id,
                    user.cloud_id,
                    user.display_name,
                    user.email,
                    user.created_at.unwrap_or(now),
                ],
                |row| row.get(0),
            )?)
        })?;
        debug!(target: "lens_db::identity", tenant = %tenant, cloud_id = %user.cloud_id, id = %id, "Upserted user identity");
        Ok(id)
    }

    /// Looks an identity up by cloud id, falling back to display name.
    pub fn get_user(&self, tenant: &Tenant, integration_id: &str, handle: &str) -> EngineResult<Option<String>> {
        let Ok(integration_id) = parse_integration_id(integration_id) else {
            return Ok(None);
        };
        let table = tenant.table(USERS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT id FROM {table} WHERE integration_id = ?1 AND (cloud_id = ?2 OR display_name = ?2) \
                         ORDER BY cloud_id = ?2 DESC, created_at ASC LIMIT 1"
                    ),
                    params![integration_id, handle],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<DbUser>> {
        let table = tenant.table(USERS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    DbUser::from_row,
                )
                .optional()?)
        })
    }

    pub fn list(
        &self,
        tenant: &Tenant,
        integration_ids: &ValueFilter<String>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> EngineResult<DbListResponse<DbUser>> {
        let mut conditions = Conditions::new(tenant);
        conditions.one_of(
            "t.integration_id",
            &crate::engine::integrations::parse_integration_ids(integration_ids)?,
        );
        let query = ListQuery {
            from: format!("{} AS t", tenant.table(USERS_TABLE)),
            conditions: &conditions,
            order_by: "t.display_name",
            order: SortingOrder::Asc,
            page: Page::resolve(page, page_size, self.db.limits()),
        };
        self.db
            .with_tenant(tenant, |conn| executor::list(conn, &query, DbUser::from_row))
    }

    /// Resolver bound to one tenant, for the ingestion row mappers.
    pub fn resolver<'a>(&'a self, tenant: &'a Tenant) -> TenantIdentityResolver<'a> {
        TenantIdentityResolver {
            service: self,
            tenant,
        }
    }
}

pub struct TenantIdentityResolver<'a> {
    service: &'a UserIdentityService,
    tenant: &'a Tenant,
}

impl IdentityResolver for TenantIdentityResolver<'_> {
    fn resolve(&self, integration_id: &str, cloud_id: &str, display_name: &str) -> EngineResult<String> {
        self.service
            .upsert(self.tenant, &DbUser::new(integration_id, cloud_id, display_name))
    }
}

impl DatabaseService for UserIdentityService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{USERS_TABLE} (
                id TEXT PRIMARY KEY,
                integration_id INTEGER NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                cloud_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                email TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (integration_id, cloud_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_integration_users_display_name
                ON {USERS_TABLE} (integration_id, display_name);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
