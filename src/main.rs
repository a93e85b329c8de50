use lens_db::frontend::start_all;
use lens_db::logging;
use lens_db::shared::config::load_settings;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    logging::init(&settings.logging)?;

    info!(
        data_dir = ?settings.storage.data_dir,
        tenants = settings.storage.tenants.len(),
        "LensDB is starting..."
    );
    start_all(&settings).await
}
