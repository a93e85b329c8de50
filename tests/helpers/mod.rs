pub mod factories;
pub mod factory;
pub mod fixtures;
pub mod tenant;

pub use tenant::{TestTenant, provision};
