use anyhow::Context;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::shared::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "lensdb.log";

fn level(raw: &str) -> anyhow::Result<LevelFilter> {
    raw.parse::<LevelFilter>()
        .with_context(|| format!("invalid log level {raw:?}"))
}

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// when `log_dir` is set. `RUST_LOG` overrides the stdout level.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let stdout_filter = EnvFilter::builder()
        .with_default_directive(level(&cfg.stdout_level)?.into())
        .from_env_lossy();
    let stdout_layer = fmt::layer().with_ansi(true).with_filter(stdout_filter);

    let file_layer = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(appender)
                    .with_filter(level(&cfg.file_level)?),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;

    info!(target: "lens_db::logging", log_dir = ?cfg.log_dir, "Logging initialized");
    Ok(())
}

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

