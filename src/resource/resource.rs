//! A named collection of items sharing a schema, storage and configuration.
//!
//! Resources form a tree: sub-resources are bound under a parent together with
//! the field of the sub-resource that holds the parent id. Binding also exposes
//! the sub-resource on the parent as a read-only connection field, which
//! projection resolves into the related items.
//!
//! Every operation runs through the composed middleware chain of its kind and
//! is reported to the resource's [`Observer`].

use super::command::{Command, is_valid_name};
use super::conf::Conf;
use super::context::RequestContext;
use super::hooks::EventHandler;
use super::item::{Item, ItemList};
use super::middleware::{self, Chains, Middleware, Scope};
use super::observer::{Observer, Operation, OperationEvent};
use crate::error::{BuildError, CompileError, ResourceError, ResourceResult};
use crate::query::{ProjectionSource, Query};
use crate::schema::{
    Connection, Dict, Field, Integer, Param, ReferenceChecker, ReferenceTarget, Schema, Text,
};
use crate::storage::{StorageHandle, Storer};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub struct Resource {
    name: String,
    path: String,
    parent_field: Option<String>,
    schema: Arc<Schema>,
    connections: BTreeMap<String, Field>,
    conf: Conf,
    resources: Vec<Resource>,
    aliases: BTreeMap<String, Query>,
    commands: BTreeMap<String, Arc<dyn Command>>,
    scope: Arc<Scope>,
    chains: Chains,
    observer: Arc<dyn Observer>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("parent_field", &self.parent_field)
            .field("conf", &self.conf)
            .field("resources", &self.resources)
            .field("aliases", &self.aliases.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Field lookup over a resource schema, falling back to its connection fields.
#[derive(Debug, Clone, Copy)]
pub struct ResourceValidator<'a> {
    schema: &'a Schema,
    connections: &'a BTreeMap<String, Field>,
}

impl<'a> ResourceValidator<'a> {
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn get_field(&self, name: &str) -> Option<&'a Field> {
        self.schema
            .get_field(name)
            .or_else(|| self.connections.get(name))
    }
}

impl Resource {
    pub(crate) fn new(
        name: String,
        schema: Schema,
        storage: Option<Arc<dyn Storer>>,
        conf: Conf,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let scope = Arc::new(Scope {
            storage: storage.map(StorageHandle::new).unwrap_or_default(),
            hooks: Default::default(),
        });
        let chains = Chains::new(&scope);
        Self {
            path: name.clone(),
            name,
            parent_field: None,
            schema: Arc::new(schema),
            connections: BTreeMap::new(),
            conf,
            resources: Vec::new(),
            aliases: BTreeMap::new(),
            commands: BTreeMap::new(),
            scope,
            chains,
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, e.g. `users.posts`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Field holding the parent id, for sub-resources.
    pub fn parent_field(&self) -> Option<&str> {
        self.parent_field.as_deref()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn validator(&self) -> ResourceValidator<'_> {
        ResourceValidator {
            schema: &self.schema,
            connections: &self.connections,
        }
    }

    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    /// Sub-resources, sorted by name.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn sub_resource(&self, name: &str) -> Option<&Resource> {
        let i = self
            .resources
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()?;
        self.resources.get(i)
    }

    pub fn sub_resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        let i = self
            .resources
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()?;
        self.resources.get_mut(i)
    }

    fn assert_not_bound(&self, name: &str) -> Result<(), BuildError> {
        let taken = self.sub_resource(name).is_some()
            || self.aliases.contains_key(name)
            || self.commands.contains_key(name);
        if taken {
            return Err(BuildError::AlreadyBound {
                name: name.to_string(),
                parent: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Bind a sub-resource under this one.
    ///
    /// `field` names the field of the sub-resource schema holding the parent id.
    /// The sub-resource also becomes a read-only connection field of this resource,
    /// accepting the `skip`, `page`, `limit`, `sort` and `filter` parameters.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        field: impl Into<String>,
        schema: Schema,
        storage: Option<Arc<dyn Storer>>,
        conf: Conf,
    ) -> Result<&mut Resource, BuildError> {
        let name = name.into();
        let field = field.into();
        self.assert_not_bound(&name)?;
        if schema.get_field(&field).is_none() {
            return Err(BuildError::MissingParentField { name, field });
        }

        let mut sub = Resource::new(name.clone(), schema, storage, conf, self.observer.clone());
        sub.parent_field = Some(field.clone());
        sub.path = format!("{}.{}", self.path, name);
        debug!("binding {} on field '{}'", sub.path, field);

        let connection = Connection {
            resource: name.clone(),
            field,
            schema: sub.schema.clone(),
        };
        self.connections.insert(name.clone(), connection_field(connection));

        let i = match self
            .resources
            .binary_search_by(|r| r.name.as_str().cmp(&name))
        {
            Ok(i) | Err(i) => i,
        };
        self.resources.insert(i, sub);
        Ok(&mut self.resources[i])
    }

    /// Register a named, pre-built query on this resource.
    pub fn alias(&mut self, name: impl Into<String>, query: Query) -> Result<(), BuildError> {
        let name = name.into();
        self.assert_not_bound(&name)?;
        self.aliases.insert(name, query);
        Ok(())
    }

    pub fn get_alias(&self, name: &str) -> Option<&Query> {
        self.aliases.get(name)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    /// Register a command. Names are limited to letters, digits, `_` and `-`.
    pub fn command(
        &mut self,
        name: impl Into<String>,
        command: impl Command + 'static,
    ) -> Result<(), BuildError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(BuildError::InvalidCommandName {
                name,
                resource: self.name.clone(),
            });
        }
        self.assert_not_bound(&name)?;
        self.commands.insert(name, Arc::new(command));
        Ok(())
    }

    pub fn get_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Attach an event handler. Every middleware chain is recomposed.
    pub fn use_handler(&mut self, handler: EventHandler) {
        Arc::make_mut(&mut self.scope).hooks.register(handler);
        self.chains.rebuild(&self.scope);
    }

    /// Attach an interceptor. The first one registered runs outermost.
    pub fn use_middleware(&mut self, middleware: Middleware) {
        self.chains.push(middleware, &self.scope);
    }

    pub(crate) fn set_observer(&mut self, observer: Arc<dyn Observer>) {
        for sub in &mut self.resources {
            sub.set_observer(observer.clone());
        }
        self.observer = observer;
    }

    /// Compile this resource's schema and every sub-resource's.
    pub fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        self.schema
            .compile(checker)
            .map_err(|e| CompileError::in_resource(&self.path, e))?;
        for sub in &self.resources {
            sub.compile(checker)?;
        }
        Ok(())
    }

    pub(crate) fn reference_target(&self) -> ReferenceTarget {
        ReferenceTarget {
            ids: self.scope.storage.identifiers(),
            id_validator: self
                .schema
                .get_field("id")
                .and_then(|f| f.validator.clone()),
            schema: Arc::downgrade(&self.schema),
        }
    }

    fn observe<T>(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        started: Instant,
        result: &ResourceResult<T>,
        found: impl FnOnce(&T) -> Option<usize>,
    ) {
        if let Err(ResourceError::Conflict) = result {
            warn!(
                "[{}] {}.{}: concurrent modification",
                ctx.request_id, self.path, operation
            );
        }
        if !self.observer.enabled() {
            return;
        }
        self.observer.record(&OperationEvent {
            ctx,
            resource: &self.path,
            operation,
            duration: started.elapsed(),
            found: result.as_ref().ok().and_then(found),
            error: result.as_ref().err(),
        });
    }

    /// Get one item by id, or `NotFound`.
    pub async fn get(&self, ctx: &RequestContext, id: &Value) -> ResourceResult<Item> {
        let started = Instant::now();
        let result = (self.chains.get)(ctx.clone(), id.clone()).await;
        self.observe(ctx, Operation::Get, started, &result, |_| Some(1));
        result
    }

    /// Get several items by id, in the same order, `None` for missing ones.
    pub async fn multi_get(
        &self,
        ctx: &RequestContext,
        ids: &[Value],
    ) -> ResourceResult<Vec<Option<Item>>> {
        let started = Instant::now();
        let result = middleware::multi_get(&self.scope, ctx, ids).await;
        self.observe(ctx, Operation::MultiGet, started, &result, |items| {
            Some(items.iter().flatten().count())
        });
        result
    }

    pub async fn find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<ItemList> {
        self.find_inner(ctx, query, false).await
    }

    /// Like [`find`](Self::find), counting matches when the storage did not.
    ///
    /// Fails with `NotImplemented` if the storage can neither report nor count.
    pub async fn find_with_total(
        &self,
        ctx: &RequestContext,
        query: &Query,
    ) -> ResourceResult<ItemList> {
        self.find_inner(ctx, query, true).await
    }

    async fn find_inner(
        &self,
        ctx: &RequestContext,
        query: &Query,
        force_total: bool,
    ) -> ResourceResult<ItemList> {
        let started = Instant::now();
        let result = (self.chains.find)(ctx.clone(), query.clone(), force_total).await;
        self.observe(ctx, Operation::Find, started, &result, |list| Some(list.len()));
        result
    }

    /// Feed every item matching `query` to `reducer`, without running hooks.
    pub async fn reduce<F>(&self, ctx: &RequestContext, query: &Query, reducer: F) -> ResourceResult<()>
    where
        F: FnMut(&Item) -> ResourceResult<()> + Send + 'static,
    {
        let started = Instant::now();
        let result = (self.chains.reduce)(ctx.clone(), query.clone(), Box::new(reducer)).await;
        self.observe(ctx, Operation::Reduce, started, &result, |_| None);
        result
    }

    /// Insert new items, returning them as stored.
    pub async fn insert(&self, ctx: &RequestContext, items: Vec<Item>) -> ResourceResult<Vec<Item>> {
        let started = Instant::now();
        let result = (self.chains.insert)(ctx.clone(), items).await;
        self.observe(ctx, Operation::Insert, started, &result, |items| Some(items.len()));
        result
    }

    /// Replace `original` by `item`, returning the item as stored.
    ///
    /// Fails with `Conflict` when the stored item no longer matches `original`.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        item: Item,
        original: &Item,
    ) -> ResourceResult<Item> {
        let started = Instant::now();
        let result = (self.chains.update)(ctx.clone(), item, original.clone()).await;
        self.observe(ctx, Operation::Update, started, &result, |_| Some(1));
        result
    }

    pub async fn delete(&self, ctx: &RequestContext, item: &Item) -> ResourceResult<Item> {
        let started = Instant::now();
        let result = (self.chains.delete)(ctx.clone(), item.clone()).await;
        self.observe(ctx, Operation::Delete, started, &result, |_| Some(1));
        result
    }

    /// Delete every item matching `query`, returning how many were removed.
    pub async fn clear(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<usize> {
        let started = Instant::now();
        let result = (self.chains.clear)(ctx.clone(), query.clone()).await;
        self.observe(ctx, Operation::Clear, started, &result, |n| Some(*n));
        result
    }

    /// Count items matching `query`. No hooks run.
    pub async fn count(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<usize> {
        let started = Instant::now();
        let result = self.scope.storage.count(ctx, query).await;
        self.observe(ctx, Operation::Count, started, &result, |n| Some(*n));
        result
    }
}

fn connection_field(connection: Connection) -> Field {
    Field::new(connection)
        .read_only()
        .with_param(
            "skip",
            Param::new("The number of items to skip", Integer::at_least(0)),
        )
        .with_param("page", Param::new("The page number", Integer::between(1, 1000)))
        .with_param(
            "limit",
            Param::new(
                "The number of items to return per page",
                Integer::between(0, 1000),
            ),
        )
        .with_param("sort", Param::new("The field(s) to sort on", Text::default()))
        .with_param("filter", Param::new("The filter query", Dict::default()))
}

#[async_trait]
impl ProjectionSource for Resource {
    fn field(&self, name: &str) -> Option<Field> {
        self.validator().get_field(name).cloned()
    }

    fn sub_source(&self, name: &str) -> Option<&dyn ProjectionSource> {
        self.sub_resource(name).map(|r| r as &dyn ProjectionSource)
    }

    fn default_limit(&self) -> Option<usize> {
        self.conf.pagination_default_limit
    }

    async fn find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<ItemList> {
        Resource::find(self, ctx, query).await
    }
}
