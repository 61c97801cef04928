//! Shared fixtures for the integration suite.
//!
//! Provides logging setup, the `users`/`users.posts` graph used by most
//! scenarios, an item builder going through prepare and validate, and storers
//! wrapping [`InMemoryStorage`] to observe or restrict what reaches storage.

use async_trait::async_trait;
use resource_layer::query::Query;
use resource_layer::resource::{Conf, Index, Item, ItemList, RequestContext, Resource};
use resource_layer::schema::{
    Field, IdentifierSet, Integer, Reference, Schema, Text, id_field, updated_field,
};
use resource_layer::storage::{InMemoryStorage, ReduceFn, StorageError, StorageResult, Storer};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn users_schema() -> Schema {
    Schema::new("users")
        .field("id", id_field())
        .field("updated", updated_field())
        .field("name", Field::new(Text::default()).required())
        .field("age", Field::new(Integer::between(0, 150)))
}

pub fn posts_schema() -> Schema {
    Schema::new("posts")
        .field("id", id_field())
        .field("user", Field::new(Reference::new("users")).required())
        .field("title", Field::new(Text::default()))
}

/// Compiled graph of `users` with `posts` bound under it, both in memory.
pub fn users_and_posts() -> Index {
    users_and_posts_on(
        Arc::new(InMemoryStorage::new()),
        Arc::new(InMemoryStorage::new()),
    )
}

pub fn users_and_posts_on(users: Arc<dyn Storer>, posts: Arc<dyn Storer>) -> Index {
    let mut index = Index::new();
    index
        .bind("users", users_schema(), Some(users), Conf::default())
        .expect("bind users")
        .bind("posts", "user", posts_schema(), Some(posts), Conf::default())
        .expect("bind posts");
    index.compile().expect("compile index");
    index
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("JSON object")
}

/// Build a new item for `resource` the way a create request would.
pub fn new_item(resource: &Resource, value: Value) -> Item {
    let ctx = RequestContext::default();
    let (changes, base) = resource.schema().prepare(&ctx, &object(value), None, false);
    let doc = resource
        .schema()
        .validate(&changes, &base)
        .expect("valid document");
    Item::new(doc).expect("item with an id")
}

/// Insert a single item and return it as stored.
pub async fn insert_one(resource: &Resource, value: Value) -> Item {
    let item = new_item(resource, value);
    resource
        .insert(&RequestContext::default(), vec![item])
        .await
        .expect("insert")
        .remove(0)
}

/// Storer recording the name of every call before delegating.
#[derive(Clone, Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn reset(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl Storer for RecordingStorage {
    async fn find(&self, ctx: &RequestContext, query: &Query) -> StorageResult<ItemList> {
        self.record("find");
        self.inner.find(ctx, query).await
    }

    async fn insert(&self, ctx: &RequestContext, items: &[Item]) -> StorageResult<()> {
        self.record("insert");
        self.inner.insert(ctx, items).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        item: &Item,
        original: &Item,
    ) -> StorageResult<()> {
        self.record("update");
        self.inner.update(ctx, item, original).await
    }

    async fn delete(&self, ctx: &RequestContext, item: &Item) -> StorageResult<()> {
        self.record("delete");
        self.inner.delete(ctx, item).await
    }

    async fn clear(&self, ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        self.record("clear");
        self.inner.clear(ctx, query).await
    }

    async fn get(&self, ctx: &RequestContext, id: &Value) -> StorageResult<Item> {
        self.record("get");
        self.inner.get(ctx, id).await
    }

    async fn count(&self, ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        self.record("count");
        self.inner.count(ctx, query).await
    }

    async fn reduce(
        &self,
        ctx: &RequestContext,
        query: &Query,
        reducer: &mut ReduceFn<'_>,
    ) -> StorageResult<()> {
        self.record("reduce");
        self.inner.reduce(ctx, query, reducer).await
    }

    fn identifiers(&self) -> Option<Arc<dyn IdentifierSet>> {
        self.inner.identifiers()
    }
}

/// Storer whose `find` never reports a total, with or without a `count`.
#[derive(Clone, Default)]
pub struct UncountedStorage {
    inner: InMemoryStorage,
    can_count: bool,
    counted: Arc<Mutex<Vec<Query>>>,
}

impl UncountedStorage {
    pub fn with_count() -> Self {
        Self {
            can_count: true,
            ..Self::default()
        }
    }

    pub fn without_count() -> Self {
        Self::default()
    }

    /// Queries passed to `count`, in call order.
    pub fn counted(&self) -> Vec<Query> {
        self.counted.lock().expect("counted lock").clone()
    }
}

#[async_trait]
impl Storer for UncountedStorage {
    async fn find(&self, ctx: &RequestContext, query: &Query) -> StorageResult<ItemList> {
        let mut list = self.inner.find(ctx, query).await?;
        list.total = None;
        Ok(list)
    }

    async fn insert(&self, ctx: &RequestContext, items: &[Item]) -> StorageResult<()> {
        self.inner.insert(ctx, items).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        item: &Item,
        original: &Item,
    ) -> StorageResult<()> {
        self.inner.update(ctx, item, original).await
    }

    async fn delete(&self, ctx: &RequestContext, item: &Item) -> StorageResult<()> {
        self.inner.delete(ctx, item).await
    }

    async fn clear(&self, ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        self.inner.clear(ctx, query).await
    }

    async fn count(&self, ctx: &RequestContext, query: &Query) -> StorageResult<usize> {
        if !self.can_count {
            return Err(StorageError::not_implemented("count"));
        }
        self.counted.lock().expect("counted lock").push(query.clone());
        self.inner.count(ctx, query).await
    }
}
