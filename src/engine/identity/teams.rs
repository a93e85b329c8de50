use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::errors::EngineResult;
use crate::engine::query::conditions::TEAM_MEMBERSHIPS_TABLE;
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;

pub const TEAMS_TABLE: &str = "teams";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// Teams and their members. Identity filters reference a team with a
/// `team_id:<uuid>` token, which expands to the member ids kept here.
pub struct TeamService {
    db: Database,
}

impl TeamService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, tenant: &Tenant, name: &str) -> EngineResult<String> {
        let table = tenant.table(TEAMS_TABLE);
        let id = Uuid::new_v4().to_string();
        self.db.with_tenant(tenant, |conn| {
            conn.execute(
                &format!("INSERT INTO {table} (id, name, created_at) VALUES (?1, ?2, ?3)"),
                params![id, name, now_epoch_seconds()],
            )?;
            Ok(())
        })?;
        info!(target: "lens_db::identity", tenant = %tenant, team = %name, id = %id, "Team created");
        Ok(id)
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<Team>> {
        let table = tenant.table(TEAMS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT id, name, created_at FROM {table} WHERE id = ?1"),
                    [id],
                    |row| {
                        Ok(Team {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Adds members, ignoring ones already present. Returns how many were new.
    pub fn add_members(&self, tenant: &Tenant, team_id: &str, user_ids: &[String]) -> EngineResult<usize> {
        let table = tenant.table(TEAM_MEMBERSHIPS_TABLE);
        self.db.with_tenant_tx(tenant, |conn| {
            let mut stmt = conn.prepare(&format!(
                "INSERT INTO {table} (team_id, user_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING"
            ))?;
            let mut added = 0;
            for user_id in user_ids {
                added += stmt.execute(params![team_id, user_id])?;
            }
            Ok(added)
        })
    }

    pub fn remove_member(&self, tenant: &Tenant, team_id: &str, user_id: &str) -> EngineResult<bool> {
        let table = tenant.table(TEAM_MEMBERSHIPS_TABLE);
        let removed = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(
                &format!("DELETE FROM {table} WHERE team_id = ?1 AND user_id = ?2"),
                params![team_id, user_id],
            )?)
        })?;
        Ok(removed > 0)
    }

    /// Member identity ids of a team, sorted.
    pub fn members(&self, tenant: &Tenant, team_id: &str) -> EngineResult<Vec<String>> {
        let table = tenant.table(TEAM_MEMBERSHIPS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT user_id FROM {table} WHERE team_id = ?1 ORDER BY user_id"
            ))?;
            let members = stmt
                .query_map([team_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(members)
        })
    }

    pub fn delete(&self, tenant: &Tenant, team_id: &str) -> EngineResult<bool> {
        let table = tenant.table(TEAMS_TABLE);
        let deleted = self.db.with_tenant(tenant, |conn| {
            Ok(conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [team_id])?)
        })?;
        Ok(deleted > 0)
    }
}

impl DatabaseService for TeamService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{TEAMS_TABLE} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {schema}.{TEAM_MEMBERSHIPS_TABLE} (
                team_id TEXT NOT NULL REFERENCES {TEAMS_TABLE}(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES integration_users(id) ON DELETE CASCADE,
                PRIMARY KEY (team_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS {schema}.idx_team_memberships_user
                ON {TEAM_MEMBERSHIPS_TABLE} (user_id);"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
