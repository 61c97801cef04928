//! Lifecycle event handlers run around storage calls.
//!
//! Each operation kind has a handler trait with a pre-hook and a post-hook, both
//! no-ops by default. Pre-hooks run in registration order and the first error
//! stops the operation before storage is touched. Post-hooks always run, in
//! registration order, and receive the in-flight result and error by mutable
//! reference so they can observe or rewrite either.
//!
//! Handlers are registered through [`EventHandler`]:
//!
//! ```rust
//! use async_trait::async_trait;
//! use resource_layer::error::ResourceResult;
//! use resource_layer::resource::{EventHandler, InsertEventHandler, Item, RequestContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct StampOwner;
//!
//! #[async_trait]
//! impl InsertEventHandler for StampOwner {
//!     async fn on_insert(&self, _ctx: &RequestContext, items: &mut [Item]) -> ResourceResult<()> {
//!         for item in items {
//!             item.payload.insert("owner".to_string(), json!("system"));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let handler = EventHandler::Insert(Arc::new(StampOwner));
//! ```

use super::context::RequestContext;
use super::item::{Item, ItemList};
use crate::error::{ResourceError, ResourceResult};
use crate::query::Query;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait GetEventHandler: Send + Sync {
    async fn on_get(&self, _ctx: &RequestContext, _id: &Value) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_got(
        &self,
        _ctx: &RequestContext,
        _item: &mut Option<Item>,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

#[async_trait]
pub trait FindEventHandler: Send + Sync {
    async fn on_find(&self, _ctx: &RequestContext, _query: &Query) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_found(
        &self,
        _ctx: &RequestContext,
        _query: &Query,
        _list: &mut Option<ItemList>,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

#[async_trait]
pub trait InsertEventHandler: Send + Sync {
    async fn on_insert(&self, _ctx: &RequestContext, _items: &mut [Item]) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_inserted(
        &self,
        _ctx: &RequestContext,
        _items: &mut Vec<Item>,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

#[async_trait]
pub trait UpdateEventHandler: Send + Sync {
    async fn on_update(
        &self,
        _ctx: &RequestContext,
        _item: &mut Item,
        _original: &Item,
    ) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_updated(
        &self,
        _ctx: &RequestContext,
        _item: &mut Item,
        _original: &Item,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

#[async_trait]
pub trait DeleteEventHandler: Send + Sync {
    async fn on_delete(&self, _ctx: &RequestContext, _item: &Item) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_deleted(
        &self,
        _ctx: &RequestContext,
        _item: &Item,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

#[async_trait]
pub trait ClearEventHandler: Send + Sync {
    async fn on_clear(&self, _ctx: &RequestContext, _query: &Query) -> ResourceResult<()> {
        Ok(())
    }

    async fn on_cleared(
        &self,
        _ctx: &RequestContext,
        _query: &Query,
        _deleted: &mut usize,
        _err: &mut Option<ResourceError>,
    ) {
    }
}

/// A handler for one operation kind, as accepted by `Resource::use_handler`.
#[derive(Clone)]
pub enum EventHandler {
    Get(Arc<dyn GetEventHandler>),
    Find(Arc<dyn FindEventHandler>),
    Insert(Arc<dyn InsertEventHandler>),
    Update(Arc<dyn UpdateEventHandler>),
    Delete(Arc<dyn DeleteEventHandler>),
    Clear(Arc<dyn ClearEventHandler>),
}

/// Registered handlers, per operation kind, in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    get: Vec<Arc<dyn GetEventHandler>>,
    find: Vec<Arc<dyn FindEventHandler>>,
    insert: Vec<Arc<dyn InsertEventHandler>>,
    update: Vec<Arc<dyn UpdateEventHandler>>,
    delete: Vec<Arc<dyn DeleteEventHandler>>,
    clear: Vec<Arc<dyn ClearEventHandler>>,
}

impl Hooks {
    pub fn register(&mut self, handler: EventHandler) {
        match handler {
            EventHandler::Get(h) => self.get.push(h),
            EventHandler::Find(h) => self.find.push(h),
            EventHandler::Insert(h) => self.insert.push(h),
            EventHandler::Update(h) => self.update.push(h),
            EventHandler::Delete(h) => self.delete.push(h),
            EventHandler::Clear(h) => self.clear.push(h),
        }
    }

    pub fn len(&self) -> usize {
        self.get.len()
            + self.find.len()
            + self.insert.len()
            + self.update.len()
            + self.delete.len()
            + self.clear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) async fn on_get(&self, ctx: &RequestContext, id: &Value) -> ResourceResult<()> {
        for h in &self.get {
            h.on_get(ctx, id).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_got(
        &self,
        ctx: &RequestContext,
        item: &mut Option<Item>,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.get {
            h.on_got(ctx, item, err).await;
        }
    }

    pub(crate) async fn on_find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<()> {
        for h in &self.find {
            h.on_find(ctx, query).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_found(
        &self,
        ctx: &RequestContext,
        query: &Query,
        list: &mut Option<ItemList>,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.find {
            h.on_found(ctx, query, list, err).await;
        }
    }

    pub(crate) async fn on_insert(
        &self,
        ctx: &RequestContext,
        items: &mut [Item],
    ) -> ResourceResult<()> {
        for h in &self.insert {
            h.on_insert(ctx, items).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_inserted(
        &self,
        ctx: &RequestContext,
        items: &mut Vec<Item>,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.insert {
            h.on_inserted(ctx, items, err).await;
        }
    }

    pub(crate) async fn on_update(
        &self,
        ctx: &RequestContext,
        item: &mut Item,
        original: &Item,
    ) -> ResourceResult<()> {
        for h in &self.update {
            h.on_update(ctx, item, original).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_updated(
        &self,
        ctx: &RequestContext,
        item: &mut Item,
        original: &Item,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.update {
            h.on_updated(ctx, item, original, err).await;
        }
    }

    pub(crate) async fn on_delete(&self, ctx: &RequestContext, item: &Item) -> ResourceResult<()> {
        for h in &self.delete {
            h.on_delete(ctx, item).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_deleted(
        &self,
        ctx: &RequestContext,
        item: &Item,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.delete {
            h.on_deleted(ctx, item, err).await;
        }
    }

    pub(crate) async fn on_clear(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<()> {
        for h in &self.clear {
            h.on_clear(ctx, query).await?;
        }
        Ok(())
    }

    pub(crate) async fn on_cleared(
        &self,
        ctx: &RequestContext,
        query: &Query,
        deleted: &mut usize,
        err: &mut Option<ResourceError>,
    ) {
        for h in &self.clear {
            h.on_cleared(ctx, query, deleted, err).await;
        }
    }
}
