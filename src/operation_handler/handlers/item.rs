//! Item flows: get, put, patch and delete
//!
//! Writes follow the same protocol: fetch the original, check the caller's
//! preconditions, prepare and validate the new document with the lookup values
//! forced into the base, then store it. Updates always pass the original to
//! storage so a writer racing between the fetch and the store gets `Conflict`.

use super::conditions::{check_integrity, is_not_modified};
use crate::{
    error::{ResourceError, ResourceResult},
    operation_handler::core::{
        ItemOperationHandler, ItemOperationRequest, ItemOperationResponse, payload_object,
    },
    query::{Predicate, Projection, Query, Window},
    resource::{ETag, Item, Mode, RequestContext, Resource},
    schema::{Change, Changes},
};
use log::debug;
use serde_json::{Map, Value};

/// Handle get operations.
pub async fn handle_get(
    handler: &ItemOperationHandler<'_>,
    ctx: &RequestContext,
    request: ItemOperationRequest,
) -> ResourceResult<ItemOperationResponse> {
    let resource = handler.resource();
    if !resource.conf().is_mode_allowed(Mode::Read) {
        return Err(ResourceError::InvalidMethod);
    }

    let item = if request.lookup.is_empty() {
        resource.get(ctx, &request.id).await?
    } else {
        let query = Query::new(Predicate::from_equalities(&handler.lookup_values(&request)))
            .with_window(Window::new(0, Some(1)));
        let list = resource.find(ctx, &query).await?;
        list.items
            .into_iter()
            .next()
            .ok_or(ResourceError::NotFound)?
    };

    if is_not_modified(&request.preconditions, &item) {
        return Ok(ItemOperationResponse::for_item(304, &item, None));
    }

    let payload = request.projection.eval(ctx, &item.payload, resource).await?;
    Ok(ItemOperationResponse::for_item(
        200,
        &item,
        Some(Value::Object(payload)),
    ))
}

/// Handle put operations: create under the given id, or replace as a whole.
pub async fn handle_put(
    handler: &ItemOperationHandler<'_>,
    ctx: &RequestContext,
    request: ItemOperationRequest,
) -> ResourceResult<ItemOperationResponse> {
    let resource = handler.resource();
    let payload = payload_object(&request)?;
    let original = handler.fetch_original(ctx, &request).await?;

    let mode = if original.is_some() {
        Mode::Replace
    } else {
        Mode::Create
    };
    if !resource.conf().is_mode_allowed(mode) {
        return Err(ResourceError::InvalidMethod);
    }
    check_integrity(&request.preconditions, original.as_ref())?;

    let (changes, base) = resource.schema().prepare(
        ctx,
        &payload,
        original.as_ref().map(|o| &o.payload),
        true,
    );
    let item = validated_item(handler, &request, changes, base, original.as_ref())?;
    let pre_etag = projected_etag(ctx, &request.projection, &item, resource).await?;

    match original {
        Some(original) => {
            let stored = resource.update(ctx, item, &original).await?;
            respond(ctx, resource, &request, stored, 200, pre_etag).await
        }
        None => {
            let stored = resource
                .insert(ctx, vec![item])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ResourceError::unknown("storage returned no item"))?;
            respond(ctx, resource, &request, stored, 201, pre_etag).await
        }
    }
}

/// Handle patch operations: change the given fields only.
pub async fn handle_patch(
    handler: &ItemOperationHandler<'_>,
    ctx: &RequestContext,
    request: ItemOperationRequest,
) -> ResourceResult<ItemOperationResponse> {
    let resource = handler.resource();
    if !resource.conf().is_mode_allowed(Mode::Update) {
        return Err(ResourceError::InvalidMethod);
    }
    let payload = payload_object(&request)?;
    let original = handler
        .fetch_original(ctx, &request)
        .await?
        .ok_or(ResourceError::NotFound)?;
    check_integrity(&request.preconditions, Some(&original))?;

    let (changes, base) = resource
        .schema()
        .prepare(ctx, &payload, Some(&original.payload), false);
    let item = validated_item(handler, &request, changes, base, Some(&original))?;
    let pre_etag = projected_etag(ctx, &request.projection, &item, resource).await?;

    let stored = resource.update(ctx, item, &original).await?;
    respond(ctx, resource, &request, stored, 200, pre_etag).await
}

/// Handle delete operations.
pub async fn handle_delete(
    handler: &ItemOperationHandler<'_>,
    ctx: &RequestContext,
    request: ItemOperationRequest,
) -> ResourceResult<ItemOperationResponse> {
    let resource = handler.resource();
    if !resource.conf().is_mode_allowed(Mode::Delete) {
        return Err(ResourceError::InvalidMethod);
    }
    let original = handler
        .fetch_original(ctx, &request)
        .await?
        .ok_or(ResourceError::NotFound)?;
    check_integrity(&request.preconditions, Some(&original))?;

    let deleted = resource.delete(ctx, &original).await?;
    Ok(ItemOperationResponse::for_item(204, &deleted, None))
}

/// Force the lookup values into the base, validate and build the new item.
///
/// Lookup fields can't be tombstoned and are never caught by the read-only check.
pub(super) fn validated_item(
    handler: &ItemOperationHandler<'_>,
    request: &ItemOperationRequest,
    mut changes: Changes,
    mut base: Map<String, Value>,
    original: Option<&Item>,
) -> ResourceResult<Item> {
    for (field, value) in handler.lookup_values(request) {
        if matches!(changes.get(&field), Some(Change::Tombstone)) {
            changes.remove(&field);
        }
        base.insert(field, value);
    }

    let doc = handler
        .resource()
        .schema()
        .validate(&changes, &base)
        .map_err(|issues| ResourceError::validation("Document contains error(s)", issues))?;

    if let Some(original) = original {
        if doc.get("id").is_some_and(|id| id != &original.id) {
            return Err(ResourceError::validation(
                "Cannot change document ID",
                Default::default(),
            ));
        }
    }
    Item::new(doc)
}

/// Etag of the document as the caller would see it.
pub(super) async fn projected_etag(
    ctx: &RequestContext,
    projection: &Projection,
    item: &Item,
    resource: &Resource,
) -> ResourceResult<ETag> {
    if projection.is_empty() {
        return Ok(item.etag.clone());
    }
    let projected = projection.eval(ctx, &item.payload, resource).await?;
    ETag::from_payload(&projected)
}

/// Project the stored item, eliding the body when the caller asked for none and
/// the visible document did not change through the pipeline.
async fn respond(
    ctx: &RequestContext,
    resource: &Resource,
    request: &ItemOperationRequest,
    item: Item,
    status: u16,
    pre_etag: ETag,
) -> ResourceResult<ItemOperationResponse> {
    let payload = request.projection.eval(ctx, &item.payload, resource).await?;
    let post_etag = if request.projection.is_empty() {
        item.etag.clone()
    } else {
        ETag::from_payload(&payload)?
    };

    if request.prefer_no_content && pre_etag == post_etag {
        debug!("eliding unchanged body of {}", item.id);
        let status = if status == 200 { 204 } else { status };
        return Ok(ItemOperationResponse::for_item(status, &item, None));
    }
    Ok(ItemOperationResponse::for_item(
        status,
        &item,
        Some(Value::Object(payload)),
    ))
}
