//! Health check endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use replication::{CacheSink, CatalogClient, ReplicaEndpoint};
use serde::Serialize;
use storage::{CatalogStore, OrderLedger};

use crate::routes::catalog::CatalogState;
use crate::routes::orders::OrderState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogHealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub service_id: String,
    pub port: u16,
    pub peers: Vec<String>,
    pub items: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub service_id: String,
    pub port: u16,
    pub catalog_replicas: Vec<ReplicaEndpoint>,
    pub load_balancing: &'static str,
    pub write_mode: &'static str,
}

/// GET /health: catalog replica status.
pub async fn catalog<S, C, K>(
    State(state): State<Arc<CatalogState<S, C, K>>>,
) -> Json<CatalogHealthResponse>
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    let (status, items) = match state.replica.items().await {
        Ok(items) => ("ok", items.len()),
        Err(error) => {
            tracing::warn!(%error, "catalog store unreadable during health check");
            ("degraded", 0)
        }
    };

    Json(CatalogHealthResponse {
        status,
        service: "catalog",
        service_id: state.service_id.clone(),
        port: state.port,
        peers: state.replica.peers().to_vec(),
        items,
    })
}

/// GET /health: order coordinator status and advisory replica health.
pub async fn order<C, L, K>(State(state): State<Arc<OrderState<C, L, K>>>) -> Json<OrderHealthResponse>
where
    C: CatalogClient + 'static,
    L: OrderLedger + 'static,
    K: CacheSink + 'static,
{
    Json(OrderHealthResponse {
        status: "ok",
        service: "order",
        service_id: state.service_id.clone(),
        port: state.port,
        catalog_replicas: state.coordinator.selector().endpoints(),
        load_balancing: "Round-Robin",
        write_mode: state.coordinator.write_mode().as_str(),
    })
}
