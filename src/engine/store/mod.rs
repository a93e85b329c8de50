pub mod database;
pub mod functions;
pub mod provisioner;
pub mod tenant;

pub use database::{Database, StoreOptions};
pub use provisioner::DatabaseService;
pub use tenant::Tenant;

#[cfg(test)]
mod database_test;
#[cfg(test)]
mod tenant_test;
