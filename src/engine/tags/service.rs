use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::engine::errors::EngineResult;
use crate::engine::query::conditions::TAG_ITEMS_TABLE;
use crate::engine::store::{Database, DatabaseService, Tenant};

pub const TAGS_TABLE: &str = "tags";

/// Kinds of entity that can carry tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagItemType {
    AwsBuild,
    CicdJobRun,
    JiraIssue,
    ScmPullRequest,
    ZendeskTicket,
}

impl TagItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagItemType::AwsBuild => "aws_build",
            TagItemType::CicdJobRun => "cicd_job_run",
            TagItemType::JiraIssue => "jira_issue",
            TagItemType::ScmPullRequest => "scm_pull_request",
            TagItemType::ZendeskTicket => "zendesk_ticket",
        }
    }
}

/// Polymorphic tagging: one tag table and one link table keyed by
/// (tag, item type, item id).
pub struct TagService {
    db: Database,
}

impl TagService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the id of the tag with this name, creating it if needed.
    pub fn upsert(&self, tenant: &Tenant, name: &str) -> EngineResult<i64> {
        let table = tenant.table(TAGS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (name) VALUES (?1) \
                     ON CONFLICT (name) DO UPDATE SET name = excluded.name RETURNING id"
                ),
                [name],
                |row| row.get(0),
            )?)
        })
    }

    pub fn get_by_name(&self, tenant: &Tenant, name: &str) -> EngineResult<Option<i64>> {
        let table = tenant.table(TAGS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT id FROM {table} WHERE name = ?1"),
                    [name],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn tag(&self, tenant: &Tenant, tag_id: i64, item_type: TagItemType, item_id: &str) -> EngineResult<()> {
        let table = tenant.table(TAG_ITEMS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (tag_id, item_type, item_id) VALUES (?1, ?2, ?3) \
                     ON CONFLICT DO NOTHING"
                ),
                params![tag_id, item_type.as_str(), item_id],
            )?;
            Ok(())
        })
    }

    pub fn untag(&self, tenant: &Tenant, tag_id: i64, item_type: TagItemType, item_id: &str) -> EngineResult<bool> {
        let table = tenant.table(TAG_ITEMS_TABLE);
        let removed = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(
                &format!("DELETE FROM {table} WHERE tag_id = ?1 AND item_type = ?2 AND item_id = ?3"),
                params![tag_id, item_type.as_str(), item_id],
            )?)
        })?;
        Ok(removed > 0)
    }

    pub fn tag_ids_for(&self, tenant: &Tenant, item_type: TagItemType, item_id: &str) -> EngineResult<Vec<i64>> {
        let table = tenant.table(TAG_ITEMS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT tag_id FROM {table} WHERE item_type = ?1 AND item_id = ?2 ORDER BY tag_id"
            ))?;
            let ids = stmt
                .query_map(params![item_type.as_str(), item_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }
}

impl DatabaseService for TagService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{TAGS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS {schema}.{TAG_ITEMS_TABLE} (
                tag_id INTEGER NOT NULL REFERENCES {TAGS_TABLE}(id) ON DELETE CASCADE,
                item_type TEXT NOT NULL,
                item_id TEXT NOT NULL,
                PRIMARY KEY (tag_id, item_type, item_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_tag_items_item
                ON {TAG_ITEMS_TABLE} (item_type, item_id);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
