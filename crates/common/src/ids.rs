use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a recorded purchase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps an existing order ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the order ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues order IDs of the form `<instance>-<unix millis>-<sequence>`.
///
/// The sequence is per process and strictly increasing, so two orders issued
/// within the same millisecond by the same instance never collide. IDs from
/// different instances are disambiguated by the instance tag.
#[derive(Debug)]
pub struct OrderIdGenerator {
    instance: String,
    sequence: AtomicU64,
}

impl OrderIdGenerator {
    /// Creates a generator tagged with the given instance name.
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the next order ID stamped with the given time.
    pub fn next_id_at(&self, now: DateTime<Utc>) -> OrderId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        OrderId(format!(
            "{}-{}-{:06}",
            self.instance,
            now.timestamp_millis(),
            seq
        ))
    }
}

/// Formats a ledger timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}
