use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Unit price of a catalog item.
pub type Price = Decimal;

/// Identifier of a catalog item (book).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new item ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the item ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A catalog entry as held by a replica's store.
///
/// `stock` is signed: the blind decrement path can drive it below zero when
/// purchases race, and the store records what it is told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    #[serde(default)]
    pub topic: String,
    pub title: String,
    #[serde(with = "crate::price")]
    pub price: Price,
    pub stock: i64,
}

impl CatalogItem {
    /// Creates a catalog item.
    pub fn new(
        id: impl Into<ItemId>,
        topic: impl Into<String>,
        title: impl Into<String>,
        price: Price,
        stock: i64,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            title: title.into(),
            price,
            stock,
        }
    }

    /// Overwrites whichever fields the patch carries.
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
    }

    /// Returns the public `/info` view of this item.
    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            title: self.title.clone(),
            quantity: self.stock,
            price: self.price,
        }
    }

    /// Returns true if the topic matches case-insensitively.
    pub fn has_topic(&self, topic: &str) -> bool {
        !self.topic.is_empty() && self.topic.to_lowercase() == topic.to_lowercase()
    }
}

/// Body of `GET /info/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub title: String,
    pub quantity: i64,
    #[serde(with = "crate::price")]
    pub price: Price,
}

/// Absolute field values to set on an item. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(
        default,
        with = "crate::price::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

impl ItemPatch {
    /// A patch that only sets the stock level.
    pub fn stock(stock: i64) -> Self {
        Self {
            price: None,
            stock: Some(stock),
        }
    }

    /// Returns true if the patch carries no field.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.stock.is_none()
    }
}

/// Body of `PUT /update/{id}`.
///
/// When `expected_stock` is present the write is a compare-and-set: it only
/// applies if the replica's current stock equals the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(flatten)]
    pub patch: ItemPatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_stock: Option<i64>,
}

impl UpdateRequest {
    /// An unconditional write of the given patch.
    pub fn blind(patch: ItemPatch) -> Self {
        Self {
            patch,
            expected_stock: None,
        }
    }

    /// A stock write guarded by the stock level the caller last observed.
    pub fn compare_and_set_stock(expected: i64, new_stock: i64) -> Self {
        Self {
            patch: ItemPatch::stock(new_stock),
            expected_stock: Some(expected),
        }
    }
}

/// A mutation propagated from one replica (or the coordinator) to a peer.
///
/// Carries no version: receivers apply messages in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMessage {
    pub item_id: ItemId,
    pub patch: ItemPatch,
}

impl SyncMessage {
    /// Creates a sync message for the given item.
    pub fn new(item_id: ItemId, patch: ItemPatch) -> Self {
        Self { item_id, patch }
    }
}

/// Body returned by `PUT /update/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub message: String,
    pub item: CatalogItem,
}

/// Body returned by `POST /sync-update/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAck {
    pub ack: bool,
    pub item_id: ItemId,
}

/// A completed sale as recorded in the order ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub order_id: OrderId,
    pub book_id: ItemId,
    pub title: String,
    pub quantity: u32,
    #[serde(with = "crate::price")]
    pub total_price: Price,
    pub timestamp: String,
}
