pub mod admin;
pub mod delete;
pub mod ingest;
pub mod query;

#[cfg(test)]
mod admin_test;
#[cfg(test)]
mod ingest_test;
#[cfg(test)]
mod query_test;
