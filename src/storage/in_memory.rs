//! In-memory storer.
//!
//! Thread-safe [`Storer`] keeping items in a `BTreeMap` behind tokio's `RwLock`.
//! Updates and deletes compare the stored id and etag with the caller's expected state
//! under the write lock, so concurrent writers racing on stale copies get
//! [`StorageError::Conflict`]. The set of stored ids is mirrored in a separate
//! synchronous index so reference validators can check membership.
//!
//! # Example Usage
//!
//! ```rust
//! use resource_layer::resource::{Item, RequestContext};
//! use resource_layer::storage::{InMemoryStorage, Storer};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let storage = InMemoryStorage::new();
//! let ctx = RequestContext::default();
//! let item = Item::new(json!({"id": "1", "name": "a"}).as_object().cloned().unwrap()).unwrap();
//!
//! storage.insert(&ctx, &[item.clone()]).await.unwrap();
//! assert_eq!(storage.get(&ctx, &json!("1")).await.unwrap(), item);
//! # });
//! ```

use super::{ReduceFn, StorageError, StorageResult, Storer};
use crate::query::Query;
use crate::resource::{Item, ItemList, RequestContext};
use crate::schema::IdentifierSet;
use async_trait::async_trait;
use log::{debug, trace};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};
use std::time::Duration;
use tokio::sync::RwLock;

/// Storage key of an id: its JSON encoding, so `"1"` and `1` stay distinct.
fn id_key(id: &Value) -> String {
    id.to_string()
}

/// Ids currently stored, readable without awaiting.
#[derive(Debug, Default)]
struct IdIndex(SyncRwLock<HashSet<String>>);

impl IdIndex {
    // A panic while holding the lock can't leave the set half-updated.
    fn edit(&self, f: impl FnOnce(&mut HashSet<String>)) {
        let mut ids = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut ids);
    }
}

impl IdentifierSet for IdIndex {
    fn contains(&self, id: &Value) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id_key(id))
    }
}

/// Thread-safe in-memory storer.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<BTreeMap<String, Item>>>,
    ids: Arc<IdIndex>,
    latency: Option<Duration>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, before any data is touched.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Get storage statistics.
    pub async fn stats(&self) -> InMemoryStorageStats {
        let data = self.data.read().await;
        InMemoryStorageStats {
            total_items: data.len(),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Storer for InMemoryStorage {
    async fn find(&self, _ctx: &RequestContext, query: &Query) -> StorageResult<ItemList> {
        self.pause().await;
        let data = self.data.read().await;

        let mut matched: Vec<&Item> = data
            .values()
            .filter(|item| query.predicate.matches(&item.payload))
            .collect();
        if !query.sort.is_empty() {
            matched.sort_by(|a, b| query.compare(&a.payload, &b.payload));
        }

        let total = matched.len();
        let (offset, limit) = query
            .window
            .map(|w| (w.offset, w.limit))
            .unwrap_or((0, None));
        let items = matched
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(ItemList {
            total: Some(total),
            offset,
            limit,
            items,
        })
    }

    async fn insert(&self, _ctx: &RequestContext, items: &[Item]) -> StorageResult<()> {
        self.pause().await;
        let mut data = self.data.write().await;

        if let Some(taken) = items.iter().find(|i| data.contains_key(&id_key(&i.id))) {
            return Err(StorageError::already_exists(id_key(&taken.id)));
        }
        self.ids.edit(|ids| {
            for item in items {
                trace!("inserting {}", item.id);
                let key = id_key(&item.id);
                data.insert(key.clone(), item.clone());
                ids.insert(key);
            }
        });
        Ok(())
    }

    async fn update(
        &self,
        _ctx: &RequestContext,
        item: &Item,
        original: &Item,
    ) -> StorageResult<()> {
        self.pause().await;
        let mut data = self.data.write().await;
        let key = id_key(&original.id);
        if item.id != original.id {
            let renamed = id_key(&item.id);
            return Err(StorageError::conflict(key.clone(), key, renamed));
        }

        let stored = data
            .get(&key)
            .ok_or_else(|| StorageError::not_found(key.clone()))?;
        if stored.etag != original.etag {
            debug!(
                "update of {key} rejected: expected {}, found {}",
                original.etag, stored.etag
            );
            return Err(StorageError::conflict(
                key,
                original.etag.as_str(),
                stored.etag.as_str(),
            ));
        }

        data.insert(key, item.clone());
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, item: &Item) -> StorageResult<()> {
        self.pause().await;
        let mut data = self.data.write().await;
        let key = id_key(&item.id);

        let stored = data
            .get(&key)
            .ok_or_else(|| StorageError::not_found(key.clone()))?;
        if stored.etag != item.etag {
            return Err(StorageError::conflict(
                key,
                item.etag.as_str(),
                stored.etag.as_str(),
            ));
        }

        data.remove(&key);
        self.ids.edit(|ids| {
            ids.remove(&key);
        });
        Ok(())
    }

    async fn clear(&self, _ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        self.pause().await;
        let mut data = self.data.write().await;

        let mut removed = 0;
        self.ids.edit(|ids| {
            data.retain(|key, item| {
                let matched = query.predicate.matches(&item.payload);
                if matched {
                    ids.remove(key);
                    removed += 1;
                }
                !matched
            });
        });
        Ok(removed)
    }

    async fn get(&self, _ctx: &RequestContext, id: &Value) -> StorageResult<Item> {
        self.pause().await;
        let data = self.data.read().await;
        data.get(&id_key(id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(id_key(id)))
    }

    async fn multi_get(
        &self,
        _ctx: &RequestContext,
        ids: &[Value],
    ) -> StorageResult<Vec<Option<Item>>> {
        self.pause().await;
        let data = self.data.read().await;
        Ok(ids.iter().map(|id| data.get(&id_key(id)).cloned()).collect())
    }

    async fn count(&self, _ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        self.pause().await;
        let data = self.data.read().await;
        Ok(data
            .values()
            .filter(|item| query.predicate.matches(&item.payload))
            .count())
    }

    async fn reduce(
        &self,
        _ctx: &RequestContext,
        query: &Query,
        reducer: &mut ReduceFn<'_>,
    ) -> StorageResult<()> {
        self.pause().await;
        let data = self.data.read().await;
        for item in data
            .values()
            .filter(|item| query.predicate.matches(&item.payload))
        {
            reducer(item).map_err(|e| StorageError::Callback(Box::new(e)))?;
        }
        Ok(())
    }

    fn identifiers(&self) -> Option<Arc<dyn IdentifierSet>> {
        Some(self.ids.clone())
    }
}

/// Statistics about in-memory storage usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStorageStats {
    /// Total number of stored items
    pub total_items: usize,
}
