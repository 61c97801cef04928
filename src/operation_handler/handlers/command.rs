//! Command execution
//!
//! The command gets a copy of the stored item. Its changes, if any, go through
//! the same prepare, validate and update steps as a replacement.

use super::conditions::check_integrity;
use super::item::validated_item;
use crate::{
    error::{ResourceError, ResourceResult},
    operation_handler::core::{
        ItemOperationHandler, ItemOperationRequest, ItemOperationResponse, payload_object,
    },
    resource::RequestContext,
};
use log::debug;
use serde_json::{Map, Value};

/// Handle command operations.
///
/// The body is `{"response": .., "item": ..}`. The item is left out when the
/// caller asked for no content and the command changed nothing.
pub async fn handle_command(
    handler: &ItemOperationHandler<'_>,
    ctx: &RequestContext,
    request: ItemOperationRequest,
) -> ResourceResult<ItemOperationResponse> {
    let resource = handler.resource();
    let name = request.command.as_deref().unwrap_or_default();
    let command = resource
        .get_command(name)
        .ok_or(ResourceError::NotFound)?;
    let payload = payload_object(&request)?;

    let original = handler
        .fetch_original(ctx, &request)
        .await?
        .ok_or(ResourceError::NotFound)?;
    check_integrity(&request.preconditions, Some(&original))?;

    let outcome = command.execute(ctx, original.clone(), payload).await?;
    let (changes, base) = resource.schema().prepare(
        ctx,
        &outcome.item.payload,
        Some(&original.payload),
        true,
    );

    let changed = !changes.is_empty();
    let (item, document) = if changed {
        debug!("command '{name}' changed {} field(s)", changes.len());
        let item = validated_item(handler, &request, changes, base, Some(&original))?;
        let stored = resource.update(ctx, item, &original).await?;
        let document = request
            .projection
            .eval(ctx, &stored.payload, resource)
            .await?;
        (stored, document)
    } else {
        let document = outcome.item.payload.clone();
        (outcome.item, document)
    };

    let mut body = Map::new();
    body.insert("response".to_string(), outcome.response);
    if !request.prefer_no_content || changed {
        body.insert("item".to_string(), Value::Object(document));
    }
    Ok(ItemOperationResponse::for_item(
        200,
        &item,
        Some(Value::Object(body)),
    ))
}
