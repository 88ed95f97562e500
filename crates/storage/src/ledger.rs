use async_trait::async_trait;
use common::PurchaseOrder;

use crate::Result;

/// Append-only record of completed purchases.
///
/// An append is durable once the returned future resolves with `Ok`.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Appends a completed order.
    async fn append(&self, order: &PurchaseOrder) -> Result<()>;

    /// Returns every recorded order in append order.
    async fn list(&self) -> Result<Vec<PurchaseOrder>>;
}
