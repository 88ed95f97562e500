//! Round-robin selection over the configured catalog replicas.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::SelectorError;

/// A catalog replica as seen by the selector.
///
/// `is_healthy` is advisory: it reflects the outcome of the last call the
/// coordinator made to the replica and never affects selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaEndpoint {
    pub address: String,
    pub is_healthy: bool,
}

#[derive(Debug)]
struct Slot {
    address: String,
    healthy: AtomicBool,
}

/// Hands out replicas in a fixed cyclic order.
///
/// The cursor lives for as long as the selector and starts at the first
/// configured replica. `next` is safe to call from concurrent tasks: each
/// call claims a distinct cursor position.
#[derive(Debug)]
pub struct ReplicaSelector {
    slots: Vec<Slot>,
    cursor: AtomicUsize,
}

impl ReplicaSelector {
    /// Creates a selector over an ordered list of replica addresses.
    ///
    /// Fails if the list is empty or contains a blank address.
    pub fn new<I, A>(addresses: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let slots = addresses
            .into_iter()
            .enumerate()
            .map(|(idx, address)| {
                let address = address.into().trim().trim_end_matches('/').to_string();
                if address.is_empty() {
                    return Err(SelectorError::EmptyAddress(idx));
                }
                Ok(Slot {
                    address,
                    healthy: AtomicBool::new(true),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if slots.is_empty() {
            return Err(SelectorError::NoReplicas);
        }

        Ok(Self {
            slots,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the replica at the cursor and advances the cursor by one.
    pub fn next(&self) -> ReplicaEndpoint {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let slot = &self.slots[position];
        metrics::counter!("replica_selections_total", "replica" => slot.address.clone())
            .increment(1);
        tracing::debug!(replica = %slot.address, position, "selected catalog replica");
        Self::endpoint(slot)
    }

    /// Returns the addresses of every replica other than `address`.
    pub fn peers_of(&self, address: &str) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.address != address)
            .map(|s| s.address.clone())
            .collect()
    }

    /// Returns a snapshot of all replicas in configured order.
    pub fn endpoints(&self) -> Vec<ReplicaEndpoint> {
        self.slots.iter().map(Self::endpoint).collect()
    }

    /// Records that the last call to `address` succeeded.
    pub fn mark_healthy(&self, address: &str) {
        self.set_health(address, true);
    }

    /// Records that the last call to `address` failed at the transport level.
    pub fn mark_unhealthy(&self, address: &str) {
        self.set_health(address, false);
    }

    fn set_health(&self, address: &str, healthy: bool) {
        for slot in self.slots.iter().filter(|s| s.address == address) {
            let was = slot.healthy.swap(healthy, Ordering::Relaxed);
            if was != healthy {
                tracing::info!(replica = %address, healthy, "replica health changed");
            }
        }
    }

    fn endpoint(slot: &Slot) -> ReplicaEndpoint {
        ReplicaEndpoint {
            address: slot.address.clone(),
            is_healthy: slot.healthy.load(Ordering::Relaxed),
        }
    }
}
