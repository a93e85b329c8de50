use crate::engine::errors::EngineResult;
use crate::engine::store::Tenant;

/// Idempotent per-tenant DDL. Every table-owning service implements it and
/// must tolerate being called repeatedly.
pub trait DatabaseService {
    fn ensure_table_existence(&self, tenant: &Tenant) -> EngineResult<()>;
}
