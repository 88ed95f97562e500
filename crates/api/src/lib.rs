//! HTTP servers for the replicated bookstore catalog.
//!
//! The catalog server hosts one replica of the item store; the order server
//! coordinates purchases across every replica. Both carry structured logging
//! (tracing), Prometheus metrics and an `X-Service-ID` header on every response.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post, put};
use common::SERVICE_ID_HEADER;
use metrics_exporter_prometheus::PrometheusHandle;
use replication::{CacheSink, CatalogClient};
use storage::{CatalogStore, OrderLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use routes::catalog::CatalogState;
use routes::orders::OrderState;

/// Creates the catalog server router.
pub fn create_catalog_app<S, C, K>(
    state: Arc<CatalogState<S, C, K>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    let service_id = state.service_id.clone();

    let router = Router::new()
        .route("/health", get(routes::health::catalog::<S, C, K>))
        .route("/info/{id}", get(routes::catalog::info::<S, C, K>))
        .route("/search/{topic}", get(routes::catalog::search::<S, C, K>))
        .route("/update/{id}", put(routes::catalog::update::<S, C, K>))
        .route(
            "/sync-update/{id}",
            post(routes::catalog::sync_update::<S, C, K>),
        )
        .with_state(state)
        .merge(metrics_router(metrics_handle));

    with_layers(router, &service_id)
}

/// Creates the order server router.
pub fn create_order_app<C, L, K>(
    state: Arc<OrderState<C, L, K>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    C: CatalogClient + 'static,
    L: OrderLedger + 'static,
    K: CacheSink + 'static,
{
    let service_id = state.service_id.clone();

    let router = Router::new()
        .route("/health", get(routes::health::order::<C, L, K>))
        .route("/purchase/{id}", post(routes::orders::purchase::<C, L, K>))
        .route("/orders", get(routes::orders::list::<C, L, K>))
        .with_state(state)
        .merge(metrics_router(metrics_handle));

    with_layers(router, &service_id)
}

fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(handle)
}

fn with_layers(router: Router, service_id: &str) -> Router {
    let service_id = HeaderValue::from_str(service_id).unwrap_or_else(|_| {
        tracing::warn!(service_id, "service id is not a valid header value");
        HeaderValue::from_static("unknown")
    });

    router
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(SERVICE_ID_HEADER),
            service_id,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
