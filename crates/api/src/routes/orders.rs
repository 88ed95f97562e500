//! Purchase and order listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ItemId, OrderId, Price, PurchaseOrder};
use replication::{CacheSink, CatalogClient, PurchaseCoordinator};
use serde::Serialize;
use storage::OrderLedger;

use crate::error::ApiError;

/// Shared state of the order server.
pub struct OrderState<C, L, K>
where
    C: CatalogClient,
    L: OrderLedger,
    K: CacheSink,
{
    pub coordinator: PurchaseCoordinator<C, L, K>,
    pub service_id: String,
    pub port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub message: &'static str,
    pub order_id: OrderId,
    pub book: String,
    #[serde(with = "common::price")]
    pub price: Price,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub order_count: usize,
    pub orders: Vec<PurchaseOrder>,
}

/// POST /purchase/:id: buy one unit of a book.
#[tracing::instrument(skip(state))]
pub async fn purchase<C, L, K>(
    State(state): State<Arc<OrderState<C, L, K>>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError>
where
    C: CatalogClient + 'static,
    L: OrderLedger + 'static,
    K: CacheSink + 'static,
{
    let receipt = state.coordinator.purchase(&ItemId::new(id)).await?;

    let response = PurchaseResponse {
        message: "Purchase successful",
        order_id: receipt.order_id,
        book: receipt.title,
        price: receipt.price,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders: every recorded order.
#[tracing::instrument(skip(state))]
pub async fn list<C, L, K>(
    State(state): State<Arc<OrderState<C, L, K>>>,
) -> Result<Json<OrderListResponse>, ApiError>
where
    C: CatalogClient + 'static,
    L: OrderLedger + 'static,
    K: CacheSink + 'static,
{
    let orders = state.coordinator.orders().await?;
    Ok(Json(OrderListResponse {
        order_count: orders.len(),
        orders,
    }))
}
