//! Scatter-gather delivery of sync messages to peer replicas.

use std::sync::Arc;
use std::time::Duration;

use common::SyncMessage;
use futures_util::StreamExt;
use futures_util::stream;

use crate::client::CatalogClient;
use crate::error::ClientError;

/// Outcome of one fan-out batch.
///
/// Only ever logged and counted; never surfaced to the purchase caller.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Peers that acknowledged the message.
    pub delivered: Vec<String>,
    /// Peers that failed, with the reason.
    pub failed: Vec<(String, ClientError)>,
}

impl FanOutReport {
    /// Returns true if every peer acknowledged the message.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends a sync message to a set of peers with bounded concurrency.
///
/// Every peer gets exactly one attempt with its own timeout. A failing peer
/// never prevents delivery to the others.
pub struct PeerFanOut<C> {
    client: Arc<C>,
    timeout: Duration,
    concurrency: usize,
}

impl<C: CatalogClient> PeerFanOut<C> {
    /// Creates a fan-out over `client`. A zero concurrency is treated as one.
    pub fn new(client: Arc<C>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Delivers `message` to every address in `peers` and waits for all
    /// attempts to finish or time out.
    #[tracing::instrument(skip(self, peers, message), fields(item_id = %message.item_id, peers = peers.len()))]
    pub async fn broadcast(&self, peers: &[String], message: &SyncMessage) -> FanOutReport {
        let outcomes: Vec<(String, Result<(), ClientError>)> = stream::iter(peers.iter().cloned())
            .map(|peer| async move {
                let result =
                    match tokio::time::timeout(self.timeout, self.client.sync_item(&peer, message))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ClientError::Timeout),
                    };
                (peer, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FanOutReport::default();
        for (peer, result) in outcomes {
            match result {
                Ok(()) => {
                    metrics::counter!("fanout_deliveries_total").increment(1);
                    report.delivered.push(peer);
                }
                Err(error) => {
                    metrics::counter!("fanout_failures_total").increment(1);
                    tracing::warn!(peer = %peer, %error, "peer sync failed, replica left stale");
                    report.failed.push((peer, error));
                }
            }
        }

        tracing::info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "fan-out finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryCatalogCluster;
    use common::{CatalogItem, ItemId, ItemPatch};
    use rust_decimal::Decimal;

    fn dune() -> CatalogItem {
        CatalogItem::new("B1", "science fiction", "Dune", Decimal::from(15), 2)
    }

    fn message(stock: i64) -> SyncMessage {
        SyncMessage::new(ItemId::new("B1"), ItemPatch::stock(stock))
    }

    async fn cluster(peers: &[&str]) -> InMemoryCatalogCluster {
        let cluster = InMemoryCatalogCluster::new();
        for peer in peers {
            cluster.add_replica(*peer, [dune()]).await;
        }
        cluster
    }

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn delivers_to_every_peer() {
        let cluster = Arc::new(cluster(&["b", "c", "d"]).await);
        let fanout = PeerFanOut::new(cluster.clone(), Duration::from_millis(200), 2);

        let report = fanout.broadcast(&peers(&["b", "c", "d"]), &message(1)).await;
        assert!(report.is_complete());
        assert_eq!(report.delivered.len(), 3);
        for peer in ["b", "c", "d"] {
            assert_eq!(cluster.syncs_received(peer).await, 1);
        }
    }

    #[tokio::test]
    async fn unreachable_peer_does_not_block_others() {
        let cluster = Arc::new(cluster(&["b", "c"]).await);
        cluster.set_unreachable("b", true).await;
        let fanout = PeerFanOut::new(cluster.clone(), Duration::from_millis(200), 4);

        let report = fanout.broadcast(&peers(&["b", "c"]), &message(1)).await;
        assert_eq!(report.delivered, vec!["c".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert_eq!(cluster.syncs_received("c").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_peer_times_out_independently() {
        let cluster = Arc::new(cluster(&["b", "c"]).await);
        cluster.set_latency("b", Duration::from_secs(60)).await;
        let fanout = PeerFanOut::new(cluster.clone(), Duration::from_millis(100), 4);

        let report = fanout.broadcast(&peers(&["b", "c"]), &message(1)).await;
        assert_eq!(report.delivered, vec!["c".to_string()]);
        assert!(matches!(report.failed[0].1, ClientError::Timeout));
    }

    #[tokio::test]
    async fn empty_peer_list_is_a_no_op() {
        let cluster = Arc::new(InMemoryCatalogCluster::new());
        let fanout = PeerFanOut::new(cluster, Duration::from_millis(100), 0);

        let report = fanout.broadcast(&[], &message(1)).await;
        assert!(report.delivered.is_empty());
        assert!(report.is_complete());
    }
}
