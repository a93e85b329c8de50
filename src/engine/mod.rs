pub mod domain;
pub mod errors;
pub mod identity;
pub mod integrations;
pub mod query;
pub mod services;
pub mod store;
pub mod tags;

pub use errors::{EngineError, EngineResult};
pub use services::Engine;
