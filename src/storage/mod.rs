//! Storage abstraction for resource items.
//!
//! A [`Storer`] persists [`Item`]s for one resource. Only `find`, `insert`,
//! `update`, `delete` and `clear` are required; `get`, `multi_get` and `reduce`
//! fall back to `find`, and `count` reports `NotImplemented` unless overridden.
//!
//! `update` and `delete` receive the state the caller expects to replace. A
//! storer must compare id and etag atomically and fail with
//! [`StorageError::Conflict`] when they differ, so lost updates are detected
//! without any lock held by the pipeline.
//!
//! [`StorageHandle`] is what resources hold: an optional storer whose calls are
//! raced against the request context.

pub mod errors;
pub mod in_memory;

pub use errors::{StorageError, StorageResult};
pub use in_memory::{InMemoryStorage, InMemoryStorageStats};

use crate::error::{ResourceError, ResourceResult};
use crate::query::{Predicate, Query};
use crate::resource::{Item, ItemList, RequestContext};
use crate::schema::IdentifierSet;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked for every item visited by [`Storer::reduce`].
pub type ReduceFn<'a> = dyn FnMut(&Item) -> ResourceResult<()> + Send + 'a;

/// Persistence backend for the items of one resource.
#[async_trait]
pub trait Storer: Send + Sync {
    /// Items matching the query's predicate, sorted and windowed.
    async fn find(&self, ctx: &RequestContext, query: &Query) -> StorageResult<ItemList>;

    /// Store new items. Fails with `AlreadyExists` if any id is taken.
    async fn insert(&self, ctx: &RequestContext, items: &[Item]) -> StorageResult<()>;

    /// Replace `original` by `item` if the stored etag still equals `original.etag`.
    async fn update(&self, ctx: &RequestContext, item: &Item, original: &Item)
    -> StorageResult<()>;

    /// Remove `item` if the stored etag still equals `item.etag`.
    async fn delete(&self, ctx: &RequestContext, item: &Item) -> StorageResult<()>;

    /// Remove every item matching the query's predicate, returning how many.
    async fn clear(&self, ctx: &RequestContext, query: &Query) -> StorageResult<usize>;

    async fn get(&self, ctx: &RequestContext, id: &Value) -> StorageResult<Item> {
        let list = self.find(ctx, &Query::by_id(id)).await?;
        list.items
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::not_found(id.to_string()))
    }

    /// Items for `ids`, position for position, `None` where missing.
    async fn multi_get(
        &self,
        ctx: &RequestContext,
        ids: &[Value],
    ) -> StorageResult<Vec<Option<Item>>> {
        let query = Query::new(Predicate::one_of("id", ids.to_vec()));
        let list = self.find(ctx, &query).await?;
        Ok(ids
            .iter()
            .map(|id| list.items.iter().find(|item| &item.id == id).cloned())
            .collect())
    }

    async fn count(&self, _ctx: &RequestContext, _query: &Query) -> StorageResult<usize> {
        Err(StorageError::not_implemented("count"))
    }

    async fn reduce(
        &self,
        ctx: &RequestContext,
        query: &Query,
        reducer: &mut ReduceFn<'_>,
    ) -> StorageResult<()> {
        let list = self.find(ctx, query).await?;
        for item in &list.items {
            reducer(item).map_err(|e| StorageError::Callback(Box::new(e)))?;
        }
        Ok(())
    }

    /// Live set of stored ids, when the backend can answer membership cheaply.
    fn identifiers(&self) -> Option<Arc<dyn IdentifierSet>> {
        None
    }
}

/// Optional storer bound to a resource.
///
/// Every call fails with [`ResourceError::NoStorage`] when nothing is bound, and
/// is abandoned with `Canceled` or `DeadlineExceeded` when the context ends first.
#[derive(Clone, Default)]
pub struct StorageHandle(Option<Arc<dyn Storer>>);

impl StorageHandle {
    pub fn new(storer: Arc<dyn Storer>) -> Self {
        Self(Some(storer))
    }

    pub fn identifiers(&self) -> Option<Arc<dyn IdentifierSet>> {
        self.0.as_ref()?.identifiers()
    }

    fn storer(&self) -> ResourceResult<&dyn Storer> {
        self.0.as_deref().ok_or(ResourceError::NoStorage)
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Value) -> ResourceResult<Item> {
        let storer = self.storer()?;
        ctx.run(async { storer.get(ctx, id).await.map_err(ResourceError::from) }).await
    }

    pub async fn multi_get(
        &self,
        ctx: &RequestContext,
        ids: &[Value],
    ) -> ResourceResult<Vec<Option<Item>>> {
        let storer = self.storer()?;
        ctx.run(async { storer.multi_get(ctx, ids).await.map_err(ResourceError::from) })
            .await
    }

    pub async fn find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<ItemList> {
        let storer = self.storer()?;
        ctx.run(async { storer.find(ctx, query).await.map_err(ResourceError::from) }).await
    }

    pub async fn count(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<usize> {
        let storer = self.storer()?;
        ctx.run(async { storer.count(ctx, query).await.map_err(ResourceError::from) }).await
    }

    pub async fn reduce(
        &self,
        ctx: &RequestContext,
        query: &Query,
        reducer: &mut ReduceFn<'_>,
    ) -> ResourceResult<()> {
        let storer = self.storer()?;
        ctx.run(async { storer.reduce(ctx, query, reducer).await.map_err(ResourceError::from) })
            .await
    }

    pub async fn insert(&self, ctx: &RequestContext, items: &[Item]) -> ResourceResult<()> {
        let storer = self.storer()?;
        ctx.run(async { storer.insert(ctx, items).await.map_err(ResourceError::from) }).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        item: &Item,
        original: &Item,
    ) -> ResourceResult<()> {
        let storer = self.storer()?;
        ctx.run(async { storer.update(ctx, item, original).await.map_err(ResourceError::from) })
            .await
    }

    pub async fn delete(&self, ctx: &RequestContext, item: &Item) -> ResourceResult<()> {
        let storer = self.storer()?;
        ctx.run(async { storer.delete(ctx, item).await.map_err(ResourceError::from) }).await
    }

    pub async fn clear(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<usize> {
        let storer = self.storer()?;
        ctx.run(async { storer.clear(ctx, query).await.map_err(ResourceError::from) }).await
    }
}
