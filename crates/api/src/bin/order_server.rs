//! Order coordinator server entry point.

use std::sync::Arc;

use api::config::OrderConfig;
use api::routes::orders::OrderState;
use replication::{
    HttpCacheSink, HttpCatalogClient, PurchaseCoordinator, PurchaseOptions, ReplicaSelector,
};
use storage::FileOrderLedger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load .env and initialize tracing
    dotenvy::dotenv().ok();
    api::server::init_tracing();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = api::server::install_metrics()?;

    // 3. Read configuration
    let config = OrderConfig::from_env()?;
    let server = &config.server;
    tracing::info!(
        service_id = %server.service_id,
        replicas = ?config.replicas,
        write_mode = %config.write_mode,
        "starting order server"
    );

    // 4. Open the ledger and build the coordinator
    let ledger = FileOrderLedger::open(&config.orders_path).await?;
    let selector = ReplicaSelector::new(config.replicas.iter().cloned())?;
    let client = HttpCatalogClient::new(server.call_timeout)?;
    let sink = HttpCacheSink::new(&server.frontend_url, server.call_timeout)?;
    let coordinator = PurchaseCoordinator::new(
        selector,
        client,
        ledger,
        sink,
        PurchaseOptions {
            instance: server.service_id.clone(),
            call_timeout: server.call_timeout,
            fanout_concurrency: server.fanout_concurrency,
            write_mode: config.write_mode,
        },
    );

    let state = Arc::new(OrderState {
        coordinator,
        service_id: server.service_id.clone(),
        port: server.port,
    });

    // 5. Serve until SIGINT/SIGTERM
    let app = api::create_order_app(state, metrics_handle);
    api::server::serve(&server.addr(), app).await?;
    Ok(())
}
