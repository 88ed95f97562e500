//! Best-effort cache invalidation towards the frontend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::ItemId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::client::http::{status_error, transport_error};
use crate::error::ClientError;

/// A remote endpoint that drops cached entries for an item.
#[async_trait]
pub trait CacheSink: Send + Sync {
    /// Asks the sink to forget any cached state for `item_id`.
    async fn invalidate(&self, item_id: &ItemId) -> Result<(), ClientError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvalidateRequest<'a> {
    book_id: &'a ItemId,
}

/// Cache sink reached over HTTP at `POST {base}/invalidate-cache`.
#[derive(Debug, Clone)]
pub struct HttpCacheSink {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCacheSink {
    /// Creates a sink for the frontend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/invalidate-cache", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl CacheSink for HttpCacheSink {
    async fn invalidate(&self, item_id: &ItemId) -> Result<(), ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&InvalidateRequest { book_id: item_id })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

/// In-memory cache sink that records every invalidation, for testing.
#[derive(Debug, Clone, Default)]
pub struct RecordingCacheSink {
    invalidated: Arc<RwLock<Vec<ItemId>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingCacheSink {
    /// Creates a sink that accepts every invalidation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to reject invalidations.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns the items invalidated so far, in order.
    pub async fn invalidated(&self) -> Vec<ItemId> {
        self.invalidated.read().await.clone()
    }
}

#[async_trait]
impl CacheSink for RecordingCacheSink {
    async fn invalidate(&self, item_id: &ItemId) -> Result<(), ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Unreachable("cache sink down".to_string()));
        }
        self.invalidated.write().await.push(item_id.clone());
        Ok(())
    }
}

/// Sends one invalidation per call and never reports failure to the caller.
#[derive(Debug, Clone)]
pub struct CacheNotifier<K> {
    sink: K,
    timeout: Duration,
}

impl<K: CacheSink> CacheNotifier<K> {
    /// Wraps a sink; each notification is abandoned after `timeout`.
    pub fn new(sink: K, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Invalidates `item_id` at the sink. Failures are logged and dropped.
    #[tracing::instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn notify(&self, item_id: &ItemId) {
        let outcome = match tokio::time::timeout(self.timeout, self.sink.invalidate(item_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout),
        };

        match outcome {
            Ok(()) => {
                metrics::counter!("cache_invalidations_total").increment(1);
                tracing::debug!("cache invalidation delivered");
            }
            Err(error) => {
                metrics::counter!("cache_invalidation_failures_total").increment(1);
                tracing::warn!(%error, "cache invalidation failed, cache may serve a stale read");
            }
        }
    }
}
