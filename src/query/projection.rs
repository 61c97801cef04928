//! Field selection applied to documents before they are returned.
//!
//! A [`Projection`] restricts and reshapes a payload. Connection fields are resolved
//! by querying the sub-resource through a [`ProjectionSource`], using the caller's
//! parameters once they pass the field's declared [`Params`](crate::schema::Params).

use super::{Predicate, Query, SortField, Window};
use crate::error::{FieldErrors, ResourceError, ResourceResult};
use crate::resource::{ItemList, RequestContext};
use crate::schema::{Connection, Field, Params};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

/// Where projection looks up field definitions and connected resources.
#[async_trait]
pub trait ProjectionSource: Send + Sync {
    /// Field definition, including synthesized connection fields.
    fn field(&self, name: &str) -> Option<Field>;

    /// Source for a connected sub-resource.
    fn sub_source(&self, name: &str) -> Option<&dyn ProjectionSource>;

    /// Page size applied to connections when the caller gives no limit.
    fn default_limit(&self) -> Option<usize> {
        None
    }

    async fn find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<ItemList>;
}

/// A selected field, optionally renamed, parameterized and projected further.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionField {
    pub name: String,
    pub alias: Option<String>,
    pub params: Map<String, Value>,
    pub children: Projection,
}

impl ProjectionField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn children(mut self, children: Projection) -> Self {
        self.children = children;
        self
    }
}

/// Ordered field selection. Empty means "everything, unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection(pub Vec<ProjectionField>);

impl Projection {
    /// Plain selection of top-level fields.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(ProjectionField::new).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Project `payload`, returning a new document.
    pub async fn eval(
        &self,
        ctx: &RequestContext,
        payload: &Map<String, Value>,
        source: &dyn ProjectionSource,
    ) -> ResourceResult<Map<String, Value>> {
        self.eval_boxed(ctx, payload, source).await
    }

    fn eval_boxed<'a>(
        &'a self,
        ctx: &'a RequestContext,
        payload: &'a Map<String, Value>,
        source: &'a dyn ProjectionSource,
    ) -> BoxFuture<'a, ResourceResult<Map<String, Value>>> {
        async move {
            if self.is_empty() {
                return Ok(payload.clone());
            }

            let mut output = Map::new();
            for selected in &self.0 {
                if selected.name == "*" {
                    for (name, value) in payload {
                        output.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                    continue;
                }

                let field = source
                    .field(&selected.name)
                    .ok_or_else(|| invalid(&selected.name, "unknown field"))?;
                let key = selected
                    .alias
                    .clone()
                    .unwrap_or_else(|| selected.name.clone());

                if let Some(connection) = field.validator.as_ref().and_then(|v| v.connection()) {
                    let sub = source
                        .sub_source(&connection.resource)
                        .ok_or_else(|| invalid(&selected.name, "connection not bound"))?;
                    let items = resolve_connection(ctx, selected, &field, connection, payload, sub)
                        .await?;
                    output.insert(key, items);
                    continue;
                }

                if let Some(name) = selected.params.keys().next() {
                    return Err(invalid(
                        &selected.name,
                        format!("unsupported parameter '{name}'"),
                    ));
                }

                let Some(value) = payload.get(&selected.name) else {
                    continue;
                };
                let value = if selected.children.is_empty() {
                    value.clone()
                } else {
                    let nested = NestedSource {
                        field: &field,
                        parent: source,
                    };
                    project_value(ctx, &selected.name, &selected.children, value, &nested).await?
                };
                output.insert(key, value);
            }

            Ok(output)
        }
        .boxed()
    }
}

fn invalid(field: &str, issue: impl Into<String>) -> ResourceError {
    ResourceError::invalid_field("Invalid projection", field, issue)
}

async fn project_value(
    ctx: &RequestContext,
    name: &str,
    children: &Projection,
    value: &Value,
    source: &dyn ProjectionSource,
) -> ResourceResult<Value> {
    match value {
        Value::Object(object) => Ok(Value::Object(
            children.eval_boxed(ctx, object, source).await?,
        )),
        Value::Array(items) => {
            let mut output = Vec::with_capacity(items.len());
            for item in items {
                let Value::Object(object) = item else {
                    return Err(invalid(name, "field has no sub-fields"));
                };
                output.push(Value::Object(
                    children.eval_boxed(ctx, object, source).await?,
                ));
            }
            Ok(Value::Array(output))
        }
        _ => Err(invalid(name, "field has no sub-fields")),
    }
}

fn validate_params(
    name: &str,
    given: &Map<String, Value>,
    accepted: &Params,
) -> ResourceResult<Map<String, Value>> {
    let mut issues = FieldErrors::new();
    let mut validated = Map::new();

    for (param, value) in given {
        match accepted.get(param) {
            None => issues.add(name, format!("unsupported parameter '{param}'")),
            Some(definition) => match definition.validator.validate(value) {
                Ok(value) => {
                    validated.insert(param.clone(), value);
                }
                Err(e) => issues.add(name, format!("invalid parameter '{param}': {e}")),
            },
        }
    }

    if issues.is_empty() {
        Ok(validated)
    } else {
        Err(ResourceError::validation("Invalid projection", issues))
    }
}

async fn resolve_connection(
    ctx: &RequestContext,
    selected: &ProjectionField,
    field: &Field,
    connection: &Connection,
    payload: &Map<String, Value>,
    sub: &dyn ProjectionSource,
) -> ResourceResult<Value> {
    let params = validate_params(&selected.name, &selected.params, &field.params)?;
    let as_usize = |name: &str| {
        params
            .get(name)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    };

    let parent_id = payload.get("id").cloned().unwrap_or(Value::Null);
    let mut query = Query::new(Predicate::equal(connection.field.clone(), parent_id));
    if let Some(Value::Object(filter)) = params.get("filter") {
        query.predicate = query.predicate.and(Predicate::from_equalities(filter));
    }
    if let Some(Value::String(sort)) = params.get("sort") {
        query.sort = SortField::parse_list(sort);
    }

    let limit = as_usize("limit").or_else(|| sub.default_limit());
    let mut offset = as_usize("skip").unwrap_or(0);
    if let (Some(page), Some(limit)) = (as_usize("page"), limit) {
        offset += page.saturating_sub(1) * limit;
    }
    if limit.is_some() || offset > 0 {
        query.window = Some(Window::new(offset, limit));
    }

    let list = sub.find(ctx, &query).await?;
    let mut items = Vec::with_capacity(list.items.len());
    for item in &list.items {
        items.push(Value::Object(
            selected.children.eval_boxed(ctx, &item.payload, sub).await?,
        ));
    }
    Ok(Value::Array(items))
}

/// Field lookup inside a nested object, delegating queries to the owning resource.
struct NestedSource<'a> {
    field: &'a Field,
    parent: &'a dyn ProjectionSource,
}

#[async_trait]
impl ProjectionSource for NestedSource<'_> {
    fn field(&self, name: &str) -> Option<Field> {
        self.field.validator.as_ref()?.get_field(name)
    }

    fn sub_source(&self, _name: &str) -> Option<&dyn ProjectionSource> {
        None
    }

    fn default_limit(&self) -> Option<usize> {
        self.parent.default_limit()
    }

    async fn find(&self, ctx: &RequestContext, query: &Query) -> ResourceResult<ItemList> {
        self.parent.find(ctx, query).await
    }
}
