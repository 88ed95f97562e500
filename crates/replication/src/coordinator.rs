//! Purchase coordinator for orchestrating stock decrements across replicas.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{
    ItemId, ItemPatch, OrderId, OrderIdGenerator, Price, PurchaseOrder, SyncMessage,
    UpdateRequest, format_timestamp,
};
use storage::{OrderLedger, StorageError};

use crate::client::CatalogClient;
use crate::error::{ClientError, PurchaseError};
use crate::fanout::PeerFanOut;
use crate::notifier::{CacheNotifier, CacheSink};
use crate::selector::{ReplicaEndpoint, ReplicaSelector};

/// How the coordinator writes the decremented stock back to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockWriteMode {
    /// Unconditional set of `stock - 1`. Two purchases that read the same
    /// stock both succeed and the item is sold twice.
    #[default]
    Blind,
    /// Set guarded by the stock value that was read. A purchase whose read
    /// went stale fails with [`PurchaseError::StockConflict`].
    CompareAndSet,
}

impl StockWriteMode {
    /// Returns the mode name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockWriteMode::Blind => "blind",
            StockWriteMode::CompareAndSet => "compare-and-set",
        }
    }
}

impl std::fmt::Display for StockWriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StockWriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blind" => Ok(StockWriteMode::Blind),
            "compare-and-set" | "cas" => Ok(StockWriteMode::CompareAndSet),
            other => Err(format!("unknown stock write mode '{other}'")),
        }
    }
}

/// Tuning knobs for a [`PurchaseCoordinator`].
#[derive(Debug, Clone)]
pub struct PurchaseOptions {
    /// Tag embedded in every order ID issued by this coordinator.
    pub instance: String,
    /// Timeout applied independently to every cross-process call.
    pub call_timeout: Duration,
    /// Maximum number of peer syncs in flight at once.
    pub fanout_concurrency: usize,
    /// Stock write strategy.
    pub write_mode: StockWriteMode,
}

impl Default for PurchaseOptions {
    fn default() -> Self {
        Self {
            instance: "order".to_string(),
            call_timeout: Duration::from_secs(2),
            fanout_concurrency: 8,
            write_mode: StockWriteMode::Blind,
        }
    }
}

/// What a successful purchase returns to the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub order_id: OrderId,
    pub title: String,
    pub price: Price,
    /// Replica that served the read and the decrement.
    pub replica: String,
}

/// Orchestrates a single-item purchase against the replicated catalog.
///
/// There is no transaction spanning the replica write and the ledger append:
/// if the append fails the stock stays decremented and the caller sees
/// [`PurchaseError::Persistence`].
pub struct PurchaseCoordinator<C, L, K>
where
    C: CatalogClient,
    L: OrderLedger,
    K: CacheSink,
{
    selector: ReplicaSelector,
    client: Arc<C>,
    ledger: L,
    notifier: CacheNotifier<K>,
    fanout: PeerFanOut<C>,
    ids: OrderIdGenerator,
    call_timeout: Duration,
    write_mode: StockWriteMode,
}

impl<C, L, K> PurchaseCoordinator<C, L, K>
where
    C: CatalogClient,
    L: OrderLedger,
    K: CacheSink,
{
    /// Creates a new purchase coordinator.
    pub fn new(
        selector: ReplicaSelector,
        client: C,
        ledger: L,
        sink: K,
        options: PurchaseOptions,
    ) -> Self {
        let client = Arc::new(client);
        let fanout = PeerFanOut::new(
            Arc::clone(&client),
            options.call_timeout,
            options.fanout_concurrency,
        );
        Self {
            selector,
            client,
            ledger,
            notifier: CacheNotifier::new(sink, options.call_timeout),
            fanout,
            ids: OrderIdGenerator::new(options.instance),
            call_timeout: options.call_timeout,
            write_mode: options.write_mode,
        }
    }

    /// Buys one unit of `item_id`.
    #[tracing::instrument(skip(self, item_id), fields(item_id = %item_id, mode = %self.write_mode))]
    pub async fn purchase(&self, item_id: &ItemId) -> Result<PurchaseReceipt, PurchaseError> {
        metrics::counter!("purchases_total").increment(1);
        let start = Instant::now();

        let result = self.run_purchase(item_id).await;

        metrics::histogram!("purchase_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("purchases_succeeded_total").increment(1);
                tracing::info!(order_id = %receipt.order_id, replica = %receipt.replica, "purchase completed");
            }
            Err(error) => {
                metrics::counter!("purchase_failures_total", "reason" => error.kind()).increment(1);
                tracing::warn!(%error, reason = error.kind(), "purchase failed");
            }
        }
        result
    }

    async fn run_purchase(&self, item_id: &ItemId) -> Result<PurchaseReceipt, PurchaseError> {
        // 1. Read the item from the next replica in turn
        let replica = self.selector.next();
        let info = self
            .call(&replica, self.client.fetch_item(&replica.address, item_id))
            .await
            .map_err(|e| self.upstream_error(item_id, &replica, e))?
            .ok_or_else(|| PurchaseError::NotFound(item_id.clone()))?;

        // 2. Reject before any side effect
        if info.quantity <= 0 {
            return Err(PurchaseError::OutOfStock(item_id.clone()));
        }

        // 3. Invalidate the frontend cache ahead of the write
        self.notifier.notify(item_id).await;

        // 4. Decrement on the same replica
        let new_stock = info.quantity - 1;
        let request = match self.write_mode {
            StockWriteMode::Blind => UpdateRequest::blind(ItemPatch::stock(new_stock)),
            StockWriteMode::CompareAndSet => {
                UpdateRequest::compare_and_set_stock(info.quantity, new_stock)
            }
        };
        let updated = self
            .call(
                &replica,
                self.client.update_item(&replica.address, item_id, &request),
            )
            .await
            .map_err(|e| match e {
                ClientError::Conflict => PurchaseError::StockConflict {
                    item_id: item_id.clone(),
                    expected: info.quantity,
                },
                e => self.upstream_error(item_id, &replica, e),
            })?;

        // 5. Record the sale
        let now = Utc::now();
        let order = PurchaseOrder {
            order_id: self.ids.next_id_at(now),
            book_id: item_id.clone(),
            title: info.title.clone(),
            quantity: 1,
            total_price: info.price,
            timestamp: format_timestamp(now),
        };
        let recorded = self.ledger.append(&order).await;

        // 6. Propagate the decrement, even if the ledger failed: the replica
        //    already holds the new stock and its peers should match it.
        let peers = self.selector.peers_of(&replica.address);
        let message = SyncMessage::new(item_id.clone(), ItemPatch::stock(updated.stock));
        let report = self.fanout.broadcast(&peers, &message).await;
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failed.len(),
                "some replicas missed the stock update and stay stale until the next write"
            );
        }

        if let Err(source) = recorded {
            tracing::error!(
                order_id = %order.order_id,
                %source,
                stock = updated.stock,
                "stock decremented but order not recorded, needs reconciliation"
            );
            return Err(PurchaseError::Persistence {
                order_id: order.order_id,
                source,
            });
        }

        // 7. Respond regardless of fan-out outcome
        Ok(PurchaseReceipt {
            order_id: order.order_id,
            title: info.title,
            price: info.price,
            replica: replica.address,
        })
    }

    /// Returns every recorded order.
    pub async fn orders(&self) -> Result<Vec<PurchaseOrder>, StorageError> {
        self.ledger.list().await
    }

    /// Returns the replica selector, for health reporting.
    pub fn selector(&self) -> &ReplicaSelector {
        &self.selector
    }

    /// Returns the configured stock write mode.
    pub fn write_mode(&self) -> StockWriteMode {
        self.write_mode
    }

    /// Runs a primary-path call under the call timeout and records the
    /// replica's advisory health.
    async fn call<T>(
        &self,
        replica: &ReplicaEndpoint,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout),
        };

        match &result {
            Err(e) if e.is_transport() => self.selector.mark_unhealthy(&replica.address),
            _ => self.selector.mark_healthy(&replica.address),
        }
        result
    }

    fn upstream_error(
        &self,
        item_id: &ItemId,
        replica: &ReplicaEndpoint,
        error: ClientError,
    ) -> PurchaseError {
        match error {
            ClientError::NotFound => PurchaseError::NotFound(item_id.clone()),
            ClientError::Timeout => PurchaseError::UpstreamTimeout {
                replica: replica.address.clone(),
            },
            other => PurchaseError::UpstreamUnavailable {
                replica: replica.address.clone(),
                reason: other.to_string(),
            },
        }
    }
}
