pub mod model;

pub use model::{LoggingConfig, QueryConfig, ServerConfig, Settings, StorageConfig, load_settings};
