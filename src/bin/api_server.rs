// HTTP query server for the local card catalog

use std::sync::Arc;

use anyhow::{Context, Result};
use snap_catalog::api::ApiServer;
use snap_catalog::config::AppConfig;
use snap_catalog::database_ops::db::CatalogStore;
use snap_catalog::logging::init_tracing;
use snap_catalog::orchestrator::sync_from_config;
use snap_catalog::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,snap_catalog=debug,actix_web=info")?;

    tracing::info!("Initializing snap catalog API server");

    let config = AppConfig::from_env()?;
    let server = ApiServer::from_env()?;

    let store = Arc::new(
        CatalogStore::open(&config.db_path, config.page_size)
            .with_context(|| format!("opening {}", config.db_path.display()))?,
    );
    tracing::info!(path = %config.db_path.display(), "Catalog store opened");

    // A failed startup sync leaves the previous snapshot in place; serve it anyway.
    if env_util::env_flag("SNAP_SYNC_ON_START", false) {
        if let Err(e) = sync_from_config(&config, Arc::clone(&store)).await {
            tracing::error!(error = %e, "startup sync failed; serving existing catalog");
        }
    }

    server.run(store).await?;

    Ok(())
}
