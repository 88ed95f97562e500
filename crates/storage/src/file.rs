//! File-backed stores.
//!
//! The catalog is kept as a single JSON array that is rewritten through a
//! temporary file and an atomic rename after every mutation. The order ledger
//! is a JSON-lines file that only ever grows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use common::{CatalogItem, ItemId, PurchaseOrder, UpdateRequest};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::catalog::{CatalogStore, UpdateOutcome, apply_update};
use crate::ledger::OrderLedger;
use crate::{Result, StorageError};

/// Catalog store persisted to a JSON file.
#[derive(Debug)]
pub struct FileCatalogStore {
    path: PathBuf,
    items: RwLock<BTreeMap<ItemId, CatalogItem>>,
}

impl FileCatalogStore {
    /// Loads the catalog from `path`. A missing file yields an empty catalog.
    #[tracing::instrument]
    pub async fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let items: Vec<CatalogItem> = serde_json::from_slice(&bytes)?;
                items.into_iter().map(|i| (i.id.clone(), i)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "catalog file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };

        tracing::info!(path = %path.display(), items = items.len(), "catalog loaded");
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    /// Creates a catalog at `path` holding exactly the given items.
    pub async fn create(
        path: impl AsRef<Path>,
        items: impl IntoIterator<Item = CatalogItem>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items: BTreeMap<_, _> = items.into_iter().map(|i| (i.id.clone(), i)).collect();
        persist(&path, &items).await?;
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }
}

async fn persist(path: &Path, items: &BTreeMap<ItemId, CatalogItem>) -> Result<()> {
    let start = Instant::now();
    let records: Vec<&CatalogItem> = items.values().collect();
    let bytes = serde_json::to_vec_pretty(&records)?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    metrics::histogram!("catalog_persist_duration_seconds").record(start.elapsed().as_secs_f64());
    tracing::debug!(path = %path.display(), items = records.len(), "catalog persisted");
    Ok(())
}

#[async_trait]
impl CatalogStore for FileCatalogStore {
    async fn get(&self, id: &ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn set(&self, item: CatalogItem) -> Result<()> {
        let mut items = self.items.write().await;
        let mut next = items.clone();
        next.insert(item.id.clone(), item);
        persist(&self.path, &next).await?;
        *items = next;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn update(&self, id: &ItemId, request: &UpdateRequest) -> Result<UpdateOutcome> {
        // The write lock is held across the file write so concurrent updates
        // persist in the order they are applied.
        let mut items = self.items.write().await;
        let mut next = items.clone();
        let outcome = apply_update(&mut next, id, request);
        if let UpdateOutcome::Applied(_) = outcome {
            persist(&self.path, &next).await?;
            *items = next;
        }
        Ok(outcome)
    }
}

/// Order ledger persisted as one JSON object per line.
#[derive(Debug)]
pub struct FileOrderLedger {
    path: PathBuf,
    orders: RwLock<Vec<PurchaseOrder>>,
}

impl FileOrderLedger {
    /// Opens the ledger at `path`, loading any orders already recorded.
    ///
    /// Blank lines are skipped and a malformed line is an error. The one
    /// exception is a final line with no terminating newline, left behind by
    /// an interrupted append: it is kept if it parses and truncated if not.
    #[tracing::instrument]
    pub async fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut orders = Vec::new();

        match tokio::fs::read(&path).await {
            Ok(mut contents) => {
                if contents.last().is_some_and(|b| *b != b'\n') {
                    repair_tail(&path, &mut contents).await?;
                }
                let contents = String::from_utf8(contents).map_err(|e| {
                    let err = std::io::Error::new(std::io::ErrorKind::InvalidData, e);
                    StorageError::io(&path, err)
                })?;
                for (idx, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let order = serde_json::from_str(line).map_err(|source| {
                        StorageError::CorruptRecord {
                            path: path.clone(),
                            line: idx + 1,
                            source,
                        }
                    })?;
                    orders.push(order);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, b"")
                    .await
                    .map_err(|e| StorageError::io(&path, e))?;
                tracing::info!(path = %path.display(), "created new order ledger");
            }
            Err(e) => return Err(StorageError::io(path, e)),
        }

        tracing::info!(path = %path.display(), orders = orders.len(), "order ledger loaded");
        Ok(Self {
            path,
            orders: RwLock::new(orders),
        })
    }
}

/// Terminates or drops the unterminated last line of `contents`, updating
/// both the buffer and the file on disk.
async fn repair_tail(path: &Path, contents: &mut Vec<u8>) -> Result<()> {
    let start = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |idx| idx + 1);
    let tail = &contents[start..];
    let complete = tail.iter().all(u8::is_ascii_whitespace)
        || serde_json::from_slice::<PurchaseOrder>(tail).is_ok();

    if complete {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StorageError::io(path, e))?;
        contents.push(b'\n');
        return Ok(());
    }

    tracing::warn!(
        path = %path.display(),
        line = contents[..start].iter().filter(|b| **b == b'\n').count() + 1,
        bytes = tail.len(),
        "truncating torn final line of order ledger"
    );
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.set_len(start as u64)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_data()
        .await
        .map_err(|e| StorageError::io(path, e))?;
    contents.truncate(start);
    Ok(())
}

#[async_trait]
impl OrderLedger for FileOrderLedger {
    async fn append(&self, order: &PurchaseOrder) -> Result<()> {
        let mut line = serde_json::to_vec(order)?;
        line.push(b'\n');

        let mut orders = self.orders.write().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        orders.push(order.clone());
        tracing::debug!(order_id = %order.order_id, "order appended to ledger");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PurchaseOrder>> {
        Ok(self.orders.read().await.clone())
    }
}
