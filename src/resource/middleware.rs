//! Per-operation handler chains.
//!
//! Every operation kind except MultiGet has a handler type and an interceptor type.
//! An interceptor receives the next handler in the chain and returns a new handler,
//! so it can act before and after the call or short-circuit it entirely. The innermost
//! handler is the default one, which runs the pre-hooks, the storage call and the
//! post-hooks.
//!
//! ```rust
//! use futures::FutureExt;
//! use resource_layer::resource::{GetHandler, Middleware, RequestContext};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! let log_gets = Middleware::get(|next: GetHandler| -> GetHandler {
//!     Arc::new(move |ctx: RequestContext, id: Value| {
//!         let next = next.clone();
//!         async move {
//!             log::debug!("[{}] get {id}", ctx.request_id);
//!             next(ctx, id).await
//!         }
//!         .boxed()
//!     })
//! });
//! ```

use super::context::RequestContext;
use super::hooks::Hooks;
use super::item::{Item, ItemList};
use crate::error::{ResourceError, ResourceResult};
use crate::query::Query;
use crate::storage::StorageHandle;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub type GetHandler =
    Arc<dyn Fn(RequestContext, Value) -> BoxFuture<'static, ResourceResult<Item>> + Send + Sync>;

/// Find handler. The flag asks for a total even when storage does not report one.
pub type FindHandler = Arc<
    dyn Fn(RequestContext, Query, bool) -> BoxFuture<'static, ResourceResult<ItemList>>
        + Send
        + Sync,
>;

/// Callback fed every item visited by a reduce.
pub type Reducer = Box<dyn FnMut(&Item) -> ResourceResult<()> + Send>;

pub type ReduceHandler = Arc<
    dyn Fn(RequestContext, Query, Reducer) -> BoxFuture<'static, ResourceResult<()>> + Send + Sync,
>;

pub type InsertHandler = Arc<
    dyn Fn(RequestContext, Vec<Item>) -> BoxFuture<'static, ResourceResult<Vec<Item>>>
        + Send
        + Sync,
>;

/// Update handler, called with the new item and the stored state it replaces.
pub type UpdateHandler = Arc<
    dyn Fn(RequestContext, Item, Item) -> BoxFuture<'static, ResourceResult<Item>> + Send + Sync,
>;

pub type DeleteHandler =
    Arc<dyn Fn(RequestContext, Item) -> BoxFuture<'static, ResourceResult<Item>> + Send + Sync>;

pub type ClearHandler =
    Arc<dyn Fn(RequestContext, Query) -> BoxFuture<'static, ResourceResult<usize>> + Send + Sync>;

/// Wraps the next handler of a chain.
pub type Interceptor<H> = Arc<dyn Fn(H) -> H + Send + Sync>;

/// An interceptor for one operation kind, as accepted by `Resource::use_middleware`.
#[derive(Clone)]
pub enum Middleware {
    Get(Interceptor<GetHandler>),
    Find(Interceptor<FindHandler>),
    Reduce(Interceptor<ReduceHandler>),
    Insert(Interceptor<InsertHandler>),
    Update(Interceptor<UpdateHandler>),
    Delete(Interceptor<DeleteHandler>),
    Clear(Interceptor<ClearHandler>),
}

impl Middleware {
    pub fn get<F>(f: F) -> Self
    where
        F: Fn(GetHandler) -> GetHandler + Send + Sync + 'static,
    {
        Self::Get(Arc::new(f))
    }

    pub fn find<F>(f: F) -> Self
    where
        F: Fn(FindHandler) -> FindHandler + Send + Sync + 'static,
    {
        Self::Find(Arc::new(f))
    }

    pub fn reduce<F>(f: F) -> Self
    where
        F: Fn(ReduceHandler) -> ReduceHandler + Send + Sync + 'static,
    {
        Self::Reduce(Arc::new(f))
    }

    pub fn insert<F>(f: F) -> Self
    where
        F: Fn(InsertHandler) -> InsertHandler + Send + Sync + 'static,
    {
        Self::Insert(Arc::new(f))
    }

    pub fn update<F>(f: F) -> Self
    where
        F: Fn(UpdateHandler) -> UpdateHandler + Send + Sync + 'static,
    {
        Self::Update(Arc::new(f))
    }

    pub fn delete<F>(f: F) -> Self
    where
        F: Fn(DeleteHandler) -> DeleteHandler + Send + Sync + 'static,
    {
        Self::Delete(Arc::new(f))
    }

    pub fn clear<F>(f: F) -> Self
    where
        F: Fn(ClearHandler) -> ClearHandler + Send + Sync + 'static,
    {
        Self::Clear(Arc::new(f))
    }
}

/// Build a [`GetHandler`] from an async closure.
pub fn get_handler<F, Fut>(f: F) -> GetHandler
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<Item>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, id: Value| f(ctx, id).boxed())
}

/// Build a [`FindHandler`] from an async closure.
pub fn find_handler<F, Fut>(f: F) -> FindHandler
where
    F: Fn(RequestContext, Query, bool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<ItemList>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, query: Query, force_total: bool| {
        f(ctx, query, force_total).boxed()
    })
}

/// Build an [`InsertHandler`] from an async closure.
pub fn insert_handler<F, Fut>(f: F) -> InsertHandler
where
    F: Fn(RequestContext, Vec<Item>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<Vec<Item>>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, items: Vec<Item>| f(ctx, items).boxed())
}

/// Build an [`UpdateHandler`] from an async closure.
pub fn update_handler<F, Fut>(f: F) -> UpdateHandler
where
    F: Fn(RequestContext, Item, Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<Item>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, item: Item, original: Item| {
        f(ctx, item, original).boxed()
    })
}

/// Build a [`DeleteHandler`] from an async closure.
pub fn delete_handler<F, Fut>(f: F) -> DeleteHandler
where
    F: Fn(RequestContext, Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<Item>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, item: Item| f(ctx, item).boxed())
}

/// Build a [`ClearHandler`] from an async closure.
pub fn clear_handler<F, Fut>(f: F) -> ClearHandler
where
    F: Fn(RequestContext, Query) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResourceResult<usize>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, query: Query| f(ctx, query).boxed())
}

/// What the default handlers close over: the storage and the event handlers.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    pub storage: StorageHandle,
    pub hooks: Hooks,
}

#[derive(Clone, Default)]
struct Registered {
    get: Vec<Interceptor<GetHandler>>,
    find: Vec<Interceptor<FindHandler>>,
    reduce: Vec<Interceptor<ReduceHandler>>,
    insert: Vec<Interceptor<InsertHandler>>,
    update: Vec<Interceptor<UpdateHandler>>,
    delete: Vec<Interceptor<DeleteHandler>>,
    clear: Vec<Interceptor<ClearHandler>>,
}

/// Registered interceptors and the handlers composed from them.
pub(crate) struct Chains {
    registered: Registered,
    pub get: GetHandler,
    pub find: FindHandler,
    pub reduce: ReduceHandler,
    pub insert: InsertHandler,
    pub update: UpdateHandler,
    pub delete: DeleteHandler,
    pub clear: ClearHandler,
}

/// Wrap `default` so the first interceptor of `chain` is the outermost.
fn compose<H>(default: H, chain: &[Interceptor<H>]) -> H {
    chain.iter().rev().fold(default, |next, interceptor| interceptor(next))
}

impl Chains {
    pub fn new(scope: &Arc<Scope>) -> Self {
        Self {
            registered: Registered::default(),
            get: default_get(scope.clone()),
            find: default_find(scope.clone()),
            reduce: default_reduce(scope.clone()),
            insert: default_insert(scope.clone()),
            update: default_update(scope.clone()),
            delete: default_delete(scope.clone()),
            clear: default_clear(scope.clone()),
        }
    }

    /// Register an interceptor and recompose its chain.
    pub fn push(&mut self, middleware: Middleware, scope: &Arc<Scope>) {
        let r = &mut self.registered;
        match middleware {
            Middleware::Get(m) => {
                r.get.push(m);
                self.get = compose(default_get(scope.clone()), &r.get);
            }
            Middleware::Find(m) => {
                r.find.push(m);
                self.find = compose(default_find(scope.clone()), &r.find);
            }
            Middleware::Reduce(m) => {
                r.reduce.push(m);
                self.reduce = compose(default_reduce(scope.clone()), &r.reduce);
            }
            Middleware::Insert(m) => {
                r.insert.push(m);
                self.insert = compose(default_insert(scope.clone()), &r.insert);
            }
            Middleware::Update(m) => {
                r.update.push(m);
                self.update = compose(default_update(scope.clone()), &r.update);
            }
            Middleware::Delete(m) => {
                r.delete.push(m);
                self.delete = compose(default_delete(scope.clone()), &r.delete);
            }
            Middleware::Clear(m) => {
                r.clear.push(m);
                self.clear = compose(default_clear(scope.clone()), &r.clear);
            }
        }
    }

    /// Recompose every chain over a new scope.
    pub fn rebuild(&mut self, scope: &Arc<Scope>) {
        let r = &self.registered;
        self.get = compose(default_get(scope.clone()), &r.get);
        self.find = compose(default_find(scope.clone()), &r.find);
        self.reduce = compose(default_reduce(scope.clone()), &r.reduce);
        self.insert = compose(default_insert(scope.clone()), &r.insert);
        self.update = compose(default_update(scope.clone()), &r.update);
        self.delete = compose(default_delete(scope.clone()), &r.delete);
        self.clear = compose(default_clear(scope.clone()), &r.clear);
    }
}

fn settle<T>(value: Option<T>, err: Option<ResourceError>) -> ResourceResult<T> {
    match (value, err) {
        (_, Some(err)) => Err(err),
        (Some(value), None) => Ok(value),
        (None, None) => Err(ResourceError::NotFound),
    }
}

fn recalc_etags(items: &mut [Item]) -> ResourceResult<()> {
    items.iter_mut().try_for_each(Item::recalc_etag)
}

fn default_get(scope: Arc<Scope>) -> GetHandler {
    Arc::new(move |ctx: RequestContext, id: Value| {
        let scope = scope.clone();
        async move {
            let mut item = None;
            let mut err = scope.hooks.on_get(&ctx, &id).await.err();
            if err.is_none() {
                match scope.storage.get(&ctx, &id).await {
                    Ok(found) => item = Some(found),
                    Err(e) => err = Some(e),
                }
            }
            scope.hooks.on_got(&ctx, &mut item, &mut err).await;
            settle(item, err)
        }
        .boxed()
    })
}

/// Fetch several items at once, running the Get hooks for every id.
///
/// The first failing pre-hook makes the storage call be skipped. Each id then gets
/// its post-hooks run with its own pre-hook error, or the global one. The first id
/// whose post-hooks changed its error decides the returned error. Any error discards
/// the whole list.
pub(crate) async fn multi_get(
    scope: &Scope,
    ctx: &RequestContext,
    ids: &[Value],
) -> ResourceResult<Vec<Option<Item>>> {
    let mut own_errs = Vec::with_capacity(ids.len());
    let mut global = None;
    for id in ids {
        let err = scope.hooks.on_get(ctx, id).await.err();
        if global.is_none() {
            global = err.clone();
        }
        own_errs.push(err);
    }

    let mut items = Vec::new();
    if global.is_none() {
        match scope.storage.multi_get(ctx, ids).await {
            Ok(found) => items = found,
            Err(e) => global = Some(e),
        }
    }

    let mut overwrite = None;
    for (i, own) in own_errs.into_iter().enumerate() {
        let mut item = items.get(i).cloned().flatten();
        let mut err = own.clone().or_else(|| global.clone());
        scope.hooks.on_got(ctx, &mut item, &mut err).await;

        if overwrite.is_none() && err != own {
            overwrite = err.clone();
        }
        if err.is_none() {
            if let Some(slot) = items.get_mut(i) {
                *slot = item;
            }
        }
    }

    match overwrite.or(global) {
        Some(err) => Err(err),
        None => Ok(items),
    }
}

fn default_find(scope: Arc<Scope>) -> FindHandler {
    Arc::new(move |ctx: RequestContext, query: Query, force_total: bool| {
        let scope = scope.clone();
        async move {
            let mut list = None;
            let mut err = scope.hooks.on_find(&ctx, &query).await.err();
            if err.is_none() {
                match scope.storage.find(&ctx, &query).await {
                    Ok(mut found) => {
                        if force_total && found.total.is_none() {
                            // Count without the window so storage counts every match.
                            match scope.storage.count(&ctx, &query.predicate_only()).await {
                                Ok(total) => found.total = Some(total),
                                Err(e) => err = Some(e),
                            }
                        }
                        list = Some(found);
                    }
                    Err(e) => err = Some(e),
                }
            }
            scope.hooks.on_found(&ctx, &query, &mut list, &mut err).await;
            settle(list, err)
        }
        .boxed()
    })
}

// Reduce is read-only and meant to be fast, so no hooks run.
fn default_reduce(scope: Arc<Scope>) -> ReduceHandler {
    Arc::new(move |ctx: RequestContext, query: Query, mut reducer: Reducer| {
        let scope = scope.clone();
        async move { scope.storage.reduce(&ctx, &query, &mut *reducer).await }.boxed()
    })
}

fn default_insert(scope: Arc<Scope>) -> InsertHandler {
    Arc::new(move |ctx: RequestContext, mut items: Vec<Item>| {
        let scope = scope.clone();
        async move {
            let mut err = scope.hooks.on_insert(&ctx, &mut items).await.err();
            if err.is_none() {
                err = match recalc_etags(&mut items) {
                    Ok(()) => scope.storage.insert(&ctx, &items).await.err(),
                    Err(e) => Some(e),
                };
            }
            scope.hooks.on_inserted(&ctx, &mut items, &mut err).await;
            settle(Some(items), err)
        }
        .boxed()
    })
}

fn default_update(scope: Arc<Scope>) -> UpdateHandler {
    Arc::new(move |ctx: RequestContext, mut item: Item, original: Item| {
        let scope = scope.clone();
        async move {
            let mut err = scope.hooks.on_update(&ctx, &mut item, &original).await.err();
            let renamed = item.id != original.id
                || item.payload.get("id").is_some_and(|id| id != &original.id);
            if err.is_none() && renamed {
                err = Some(ResourceError::validation(
                    "Cannot change document ID",
                    Default::default(),
                ));
            }
            if err.is_none() {
                err = match item.recalc_etag() {
                    Ok(()) => scope.storage.update(&ctx, &item, &original).await.err(),
                    Err(e) => Some(e),
                };
            }
            scope
                .hooks
                .on_updated(&ctx, &mut item, &original, &mut err)
                .await;
            settle(Some(item), err)
        }
        .boxed()
    })
}

fn default_delete(scope: Arc<Scope>) -> DeleteHandler {
    Arc::new(move |ctx: RequestContext, item: Item| {
        let scope = scope.clone();
        async move {
            let mut err = scope.hooks.on_delete(&ctx, &item).await.err();
            if err.is_none() {
                err = scope.storage.delete(&ctx, &item).await.err();
            }
            scope.hooks.on_deleted(&ctx, &item, &mut err).await;
            settle(Some(item), err)
        }
        .boxed()
    })
}

fn default_clear(scope: Arc<Scope>) -> ClearHandler {
    Arc::new(move |ctx: RequestContext, query: Query| {
        let scope = scope.clone();
        async move {
            let mut deleted = 0;
            let mut err = scope.hooks.on_clear(&ctx, &query).await.err();
            if err.is_none() {
                match scope.storage.clear(&ctx, &query).await {
                    Ok(n) => deleted = n,
                    Err(e) => err = Some(e),
                }
            }
            scope
                .hooks
                .on_cleared(&ctx, &query, &mut deleted, &mut err)
                .await;
            settle(Some(deleted), err)
        }
        .boxed()
    })
}
