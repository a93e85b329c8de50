pub mod context;
pub mod http;

use std::sync::Arc;

use context::FrontendContext;

use crate::shared::config::Settings;

/// Opens the engine and serves HTTP until shutdown.
pub async fn start_all(settings: &Settings) -> anyhow::Result<()> {
    let ctx = FrontendContext::from_settings(settings)?;
    http::listener::run_http_server(Arc::clone(&ctx)).await
}
