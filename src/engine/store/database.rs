use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::query::page::QueryLimits;
use crate::engine::store::functions;
use crate::engine::store::tenant::Tenant;
use crate::shared::config::Settings;
use crate::shared::datetime::{CalendarBucketer, TimeConfig};

/// How the store is opened.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// One `<tenant>.db` file per tenant under this directory; in-memory when None.
    pub data_dir: Option<PathBuf>,
    pub busy_timeout: Option<Duration>,
    pub time: TimeConfig,
    pub limits: QueryLimits,
}

impl StoreOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: settings.storage.data_dir.as_ref().map(PathBuf::from),
            busy_timeout: Some(Duration::from_millis(settings.storage.busy_timeout_ms)),
            time: settings.time.clone().unwrap_or_default(),
            limits: settings
                .query
                .map(QueryLimits::from_config)
                .unwrap_or_default(),
        }
    }
}

/// Shared handle to the relational store.
///
/// Every tenant gets its own connection with the tenant database attached
/// under the tenant's name, so `"<tenant>".<table>` resolves the same way
/// for all of them. Calls on one tenant are serialized by that tenant's
/// mutex; different tenants do not contend.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    tenants: Mutex<HashMap<Tenant, Arc<Mutex<Connection>>>>,
    data_dir: Option<PathBuf>,
    busy_timeout: Option<Duration>,
    bucketer: CalendarBucketer,
    limits: QueryLimits,
}

impl Database {
    /// Opens the store. With a data dir, every `<tenant>.db` file already in
    /// it is attached again.
    pub fn open(options: StoreOptions) -> EngineResult<Self> {
        let db = Self {
            inner: Arc::new(DatabaseInner {
                tenants: Mutex::new(HashMap::new()),
                data_dir: options.data_dir.clone(),
                busy_timeout: options.busy_timeout,
                bucketer: CalendarBucketer::new(&options.time),
                limits: options.limits,
            }),
        };

        let mut reopened = 0;
        if let Some(dir) = &options.data_dir {
            fs::create_dir_all(dir)?;
            for tenant in tenant_files(dir)? {
                db.ensure_schema_existence(&tenant)?;
                reopened += 1;
            }
        }

        info!(
            target: "lens_db::store",
            data_dir = ?options.data_dir,
            timezone = ?options.time.timezone,
            reopened,
            "Opened store"
        );
        Ok(db)
    }

    pub fn in_memory() -> EngineResult<Self> {
        Self::open(StoreOptions::default())
    }

    pub fn limits(&self) -> QueryLimits {
        self.inner.limits
    }

    /// Opens the tenant's connection if it is not open yet.
    pub fn ensure_schema_existence(&self, tenant: &Tenant) -> EngineResult<()> {
        let mut tenants = self.inner.tenants.lock();
        if tenants.contains_key(tenant) {
            return Ok(());
        }

        let location = match &self.inner.data_dir {
            Some(dir) => dir
                .join(format!("{}.db", tenant.as_str()))
                .to_string_lossy()
                .into_owned(),
            None => ":memory:".to_string(),
        };
        let conn = self.connect(tenant, &location)?;
        tenants.insert(tenant.clone(), Arc::new(Mutex::new(conn)));

        debug!(target: "lens_db::store", tenant = %tenant, location = %location, "Attached tenant schema");
        Ok(())
    }

    fn connect(&self, tenant: &Tenant, location: &str) -> EngineResult<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        if let Some(timeout) = self.inner.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        functions::register(&conn, &self.inner.bucketer)?;
        conn.execute("ATTACH DATABASE ?1 AS ?2", params![location, tenant.as_str()])?;
        Ok(conn)
    }

    pub fn has_schema(&self, tenant: &Tenant) -> EngineResult<bool> {
        Ok(self.inner.tenants.lock().contains_key(tenant))
    }

    /// Names of every open tenant, sorted.
    pub fn tenants(&self) -> EngineResult<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .tenants
            .lock()
            .keys()
            .map(|t| t.as_str().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn connection(&self, tenant: &Tenant) -> EngineResult<Arc<Mutex<Connection>>> {
        self.inner
            .tenants
            .lock()
            .get(tenant)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTenant(tenant.to_string()))
    }

    /// Runs `f` against the tenant's connection.
    pub fn with_tenant<T>(
        &self,
        tenant: &Tenant,
        f: impl FnOnce(&Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let conn = self.connection(tenant)?;
        let conn = conn.lock();
        f(&conn)
    }

    /// Like [`Database::with_tenant`] but inside a transaction that commits
    /// only when `f` succeeds.
    pub fn with_tenant_tx<T>(
        &self,
        tenant: &Tenant,
        f: impl FnOnce(&Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let conn = self.connection(tenant)?;
        let mut conn = conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Tenants with a database file in `dir`. Files whose stem is not a valid
/// tenant name are skipped.
fn tenant_files(dir: &Path) -> EngineResult<Vec<Tenant>> {
    let mut tenants = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("db") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match Tenant::parse(stem) {
            Ok(tenant) => tenants.push(tenant),
            Err(_) => {
                warn!(target: "lens_db::store", file = %path.display(), "Skipping file with invalid tenant name");
            }
        }
    }
    tenants.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(tenants)
}
