//! Catalog replica server entry point.

use std::sync::Arc;

use api::config::CatalogConfig;
use api::routes::catalog::CatalogState;
use replication::{CatalogReplica, HttpCacheSink, HttpCatalogClient};
use storage::FileCatalogStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load .env and initialize tracing
    dotenvy::dotenv().ok();
    api::server::init_tracing();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = api::server::install_metrics()?;

    // 3. Read configuration
    let config = CatalogConfig::from_env()?;
    let server = &config.server;
    tracing::info!(
        service_id = %server.service_id,
        peers = ?config.peers,
        path = %config.catalog_path.display(),
        "starting catalog server"
    );

    // 4. Open the store and wire up peers and the cache sink
    let store = FileCatalogStore::open(&config.catalog_path).await?;
    let client = HttpCatalogClient::new(server.call_timeout)?;
    let sink = HttpCacheSink::new(&server.frontend_url, server.call_timeout)?;
    let replica = CatalogReplica::new(
        Arc::new(store),
        config.peers.clone(),
        client,
        sink,
        server.call_timeout,
        server.fanout_concurrency,
    );

    let state = Arc::new(CatalogState {
        replica,
        service_id: server.service_id.clone(),
        port: server.port,
    });

    // 5. Serve until SIGINT/SIGTERM
    let app = api::create_catalog_app(state, metrics_handle);
    api::server::serve(&server.addr(), app).await?;
    Ok(())
}
