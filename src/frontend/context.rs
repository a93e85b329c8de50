use std::sync::Arc;

use crate::engine::Engine;
use crate::engine::errors::EngineResult;
use crate::engine::store::Tenant;
use crate::shared::config::Settings;

/// State shared by every connection.
pub struct FrontendContext {
    pub engine: Arc<Engine>,
    pub auth_token: Option<String>,
    pub http_addr: String,
}

impl FrontendContext {
    pub fn new(engine: Engine, auth_token: Option<String>, http_addr: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(engine),
            auth_token,
            http_addr: http_addr.into(),
        })
    }

    /// Opens the engine from settings and provisions the configured tenants.
    pub fn from_settings(settings: &Settings) -> EngineResult<Arc<Self>> {
        let engine = Engine::from_settings(settings)?;
        for name in &settings.storage.tenants {
            engine.ensure_tenant(&Tenant::parse(name)?)?;
        }
        Ok(Self::new(
            engine,
            settings.server.auth_token.clone(),
            settings.server.http_addr.clone(),
        ))
    }
}
