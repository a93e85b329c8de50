use rusqlite::ErrorCode;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors surfaced by the storage and query layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed filter, unsupported calculation or across dimension.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unique/foreign key/check violation; the engine message (with the
    /// constraint name) is kept verbatim.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Invalid tenant name: {0}")]
    InvalidTenant(String),

    #[error("SQL error: {0}")]
    Sql(rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, EngineError::Constraint(_))
    }

    pub fn log_error(&self) {
        match self {
            EngineError::Validation(msg) => {
                warn!(target: "lens_db::engine", "Rejected request: {}", msg);
            }
            EngineError::Constraint(msg) => {
                warn!(target: "lens_db::engine", "Constraint violation: {}", msg);
            }
            EngineError::UnknownTenant(t) | EngineError::InvalidTenant(t) => {
                warn!(target: "lens_db::engine", tenant = %t, "{}", self);
            }
            EngineError::Sql(e) => {
                error!(target: "lens_db::engine", "SQL error: {}", e);
                debug!(target: "lens_db::engine", "SQL error details: {:?}", e);
            }
            EngineError::Json(e) => {
                error!(target: "lens_db::engine", "JSON error: {}", e);
            }
            EngineError::Io(e) => {
                error!(target: "lens_db::engine", "I/O error: {}", e);
                debug!(target: "lens_db::engine", "I/O error details: {:?}", e);
            }
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, msg)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                EngineError::Constraint(msg.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => EngineError::Sql(err),
        }
    }
}
