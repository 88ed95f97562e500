//! Catalog replica endpoints: reads, direct updates and peer syncs.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{
    ItemId, ItemInfo, ItemPatch, SYNC_MARKER_HEADER, SyncAck, SyncMessage, UpdateRequest,
    UpdateResponse, is_sync_marker,
};
use replication::{CacheSink, CatalogClient, CatalogReplica, SearchHit};
use storage::CatalogStore;

use crate::error::ApiError;

/// Shared state of a catalog server.
pub struct CatalogState<S, C, K> {
    pub replica: CatalogReplica<S, C, K>,
    pub service_id: String,
    pub port: u16,
}

fn sync_marker(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SYNC_MARKER_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// GET /info/:id: title, stock and price of one item.
#[tracing::instrument(skip(state))]
pub async fn info<S, C, K>(
    State(state): State<Arc<CatalogState<S, C, K>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemInfo>, ApiError>
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    let info = state.replica.info(&ItemId::new(id)).await?;
    Ok(Json(info))
}

/// GET /search/:topic: items filed under a topic.
#[tracing::instrument(skip(state))]
pub async fn search<S, C, K>(
    State(state): State<Arc<CatalogState<S, C, K>>>,
    Path(topic): Path<String>,
) -> Result<Json<Vec<SearchHit>>, ApiError>
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    let hits = state.replica.search(&topic).await?;
    Ok(Json(hits))
}

/// PUT /update/:id: set price and/or stock.
///
/// Requests without the peer marker also invalidate the frontend cache and
/// are replicated to every peer.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update<S, C, K>(
    State(state): State<Arc<CatalogState<S, C, K>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ApiError>
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    if req.expected_stock.is_some() && req.patch.stock.is_none() {
        return Err(ApiError::BadRequest(
            "expectedStock requires a new stock value".to_string(),
        ));
    }

    let item = state
        .replica
        .update(&ItemId::new(id), &req, sync_marker(&headers))
        .await?;

    Ok(Json(UpdateResponse {
        message: "Book updated successfully".to_string(),
        item,
    }))
}

/// POST /sync-update/:id: apply a change pushed by a peer.
///
/// The body is only parsed for callers carrying the peer marker, so unmarked
/// callers get 403 whatever they send. An empty body is an empty patch.
#[tracing::instrument(skip(state, headers, body))]
pub async fn sync_update<S, C, K>(
    State(state): State<Arc<CatalogState<S, C, K>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncAck>, ApiError>
where
    S: CatalogStore + 'static,
    C: CatalogClient + 'static,
    K: CacheSink + 'static,
{
    let marker = sync_marker(&headers);

    // Unmarked bodies are never parsed; the receiver rejects the call.
    let patch = if !is_sync_marker(marker) || body.is_empty() {
        ItemPatch::default()
    } else {
        serde_json::from_slice::<ItemPatch>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid sync patch: {e}")))?
    };

    let message = SyncMessage::new(ItemId::new(id), patch);
    let ack = state.replica.sync_update(marker, &message).await?;
    Ok(Json(ack))
}
