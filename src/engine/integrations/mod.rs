pub mod service;

pub use service::{Integration, IntegrationService, parse_integration_id, parse_integration_ids};

#[cfg(test)]
mod service_test;
