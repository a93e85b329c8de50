use rusqlite::{OptionalExtension, Row, named_params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::domain::common;
use crate::engine::errors::EngineResult;
use crate::engine::store::{Database, DatabaseService, Tenant};
use crate::shared::datetime::now_epoch_seconds;

pub const JOBS_TABLE: &str = "cicd_jobs";

/// A job (pipeline) defined on a CI/CD instance. Natural key:
/// (cicd_instance_id, job_name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCdJob {
    #[serde(default)]
    pub id: Option<String>,
    pub cicd_instance_id: String,
    pub job_name: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub scm_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl CiCdJob {
    pub fn new(cicd_instance_id: &str, job_name: &str) -> Self {
        Self {
            id: None,
            cicd_instance_id: cicd_instance_id.to_string(),
            job_name: job_name.to_string(),
            project_name: None,
            scm_url: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            cicd_instance_id: row.get("cicd_instance_id")?,
            job_name: row.get("job_name")?,
            project_name: row.get("project_name")?,
            scm_url: row.get("scm_url")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct CiCdJobService {
    db: Database,
}

impl CiCdJobService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn upsert(&self, tenant: &Tenant, job: &CiCdJob) -> EngineResult<String> {
        let table = tenant.table(JOBS_TABLE);
        let now = now_epoch_seconds();
        self.db.with_tenant(tenant, |conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, cicd_instance_id, job_name, project_name, scm_url, created_at, updated_at) \
                     VALUES (:id, :instance, :job_name, :project_name, :scm_url, :now, :now) \
                     ON CONFLICT (cicd_instance_id, job_name) DO UPDATE SET \
                        project_name = COALESCE(excluded.project_name, project_name), \
                        scm_url = COALESCE(excluded.scm_url, scm_url), \
                        updated_at = excluded.updated_at \
                     RETURNING id"
                ),
                named_params! {
                    ":id": Uuid::new_v4().to_string(),
                    ":instance": job.cicd_instance_id,
                    ":job_name": job.job_name,
                    ":project_name": job.project_name,
                    ":scm_url": job.scm_url,
                    ":now": now,
                },
                |row| row.get(0),
            )?)
        })
    }

    pub fn get(&self, tenant: &Tenant, id: &str) -> EngineResult<Option<CiCdJob>> {
        let table = tenant.table(JOBS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE id = ?1"),
                    [id],
                    CiCdJob::from_row,
                )
                .optional()?)
        })
    }

    pub fn get_by_name(&self, tenant: &Tenant, cicd_instance_id: &str, job_name: &str) -> EngineResult<Option<CiCdJob>> {
        let table = tenant.table(JOBS_TABLE);
        self.db.with_tenant(tenant, |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {table} WHERE cicd_instance_id = ?1 AND job_name = ?2"),
                    [cicd_instance_id, job_name],
                    CiCdJob::from_row,
                )
                .optional()?)
        })
    }

    pub fn delete(&self, tenant: &Tenant, id: &str) -> EngineResult<bool> {
        common::delete_by_id(&self.db, tenant, JOBS_TABLE, id)
    }
}

impl DatabaseService for CiCdJobService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let schema = tenant.schema();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{JOBS_TABLE} (
                id TEXT PRIMARY KEY,
                cicd_instance_id TEXT NOT NULL REFERENCES cicd_instances(id) ON DELETE CASCADE,
                job_name TEXT NOT NULL,
                project_name TEXT,
                scm_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (cicd_instance_id, job_name)
            );"
        );
        self.db.with_tenant(tenant, |conn| Ok(conn.execute_batch(&ddl)?))
    }
}
