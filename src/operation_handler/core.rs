//! Core operation handler infrastructure
//!
//! This module contains the request/response types and the dispatcher for item
//! operations. The individual flows live in the `handlers` modules.

use crate::{
    error::{ResourceError, ResourceResult},
    query::{Predicate, Projection, Query, Window},
    resource::{ETag, Item, RequestContext, Resource},
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transport-agnostic handler for operations on a single item of a resource.
///
/// Requests carry the conditional tokens a transport would read from headers,
/// so the optimistic concurrency protocol is enforced here rather than by
/// every caller.
pub struct ItemOperationHandler<'a> {
    pub(super) resource: &'a Resource,
}

/// Types of item operations supported by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemOperationType {
    /// Read the item
    Get,
    /// Create the item under a known id, or replace it as a whole
    Put,
    /// Modify some fields of the item
    Patch,
    /// Delete the item
    Delete,
    /// Run a named command against the item
    Command,
}

/// Conditional request tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preconditions {
    /// Write only if the stored etag matches (`*`, a list or a single tag)
    pub if_match: Option<String>,
    /// Read answers not-modified if the stored etag matches
    pub if_none_match: Option<String>,
    /// Read answers not-modified unless the item changed after this time
    pub if_modified_since: Option<DateTime<Utc>>,
    /// Write only if the item did not change after this time
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

/// Structured request for an item operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOperationRequest {
    pub operation: ItemOperationType,
    /// Id of the targeted item
    pub id: Value,
    /// Values fixed by the item's location, such as the parent id of a sub-resource
    pub lookup: Map<String, Value>,
    /// Document for writes, command input for commands
    pub payload: Value,
    /// Shape of the returned document
    pub projection: Projection,
    pub preconditions: Preconditions,
    /// Caller does not need the document back
    pub prefer_no_content: bool,
    /// Command name for `Command` operations
    pub command: Option<String>,
}

/// Structured response from an item operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOperationResponse {
    /// HTTP status code
    pub status: u16,
    pub etag: Option<ETag>,
    pub last_modified: Option<DateTime<Utc>>,
    pub body: Option<Value>,
}

impl ItemOperationResponse {
    pub(super) fn for_item(status: u16, item: &Item, body: Option<Value>) -> Self {
        Self {
            status,
            etag: Some(item.etag.clone()),
            last_modified: Some(item.updated),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

impl<'a> ItemOperationHandler<'a> {
    /// Create a new operation handler for the given resource.
    pub fn new(resource: &'a Resource) -> Self {
        Self { resource }
    }

    /// Handle a request, rendering any failure as an error response.
    pub async fn handle_operation(
        &self,
        ctx: &RequestContext,
        request: ItemOperationRequest,
    ) -> ItemOperationResponse {
        let operation = request.operation;
        match self.execute(ctx, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "{:?} on {} failed: {} (request: '{}')",
                    operation,
                    self.resource.path(),
                    e,
                    ctx.request_id
                );
                super::errors::create_error_response(&e)
            }
        }
    }

    /// Dispatch a request to its flow.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        request: ItemOperationRequest,
    ) -> ResourceResult<ItemOperationResponse> {
        info!(
            "{:?} {} on {} (request: '{}')",
            request.operation,
            request.id,
            self.resource.path(),
            ctx.request_id
        );

        let result = match request.operation {
            ItemOperationType::Get => super::handlers::item::handle_get(self, ctx, request).await,
            ItemOperationType::Put => super::handlers::item::handle_put(self, ctx, request).await,
            ItemOperationType::Patch => {
                super::handlers::item::handle_patch(self, ctx, request).await
            }
            ItemOperationType::Delete => {
                super::handlers::item::handle_delete(self, ctx, request).await
            }
            ItemOperationType::Command => {
                super::handlers::command::handle_command(self, ctx, request).await
            }
        };

        if let Ok(response) = &result {
            debug!(
                "item operation completed with status {} (request: '{}')",
                response.status, ctx.request_id
            );
        }
        result
    }

    pub(super) fn resource(&self) -> &'a Resource {
        self.resource
    }

    /// Field values identifying the item: the lookup values plus its id.
    pub(super) fn lookup_values(&self, request: &ItemOperationRequest) -> Map<String, Value> {
        let mut values = request.lookup.clone();
        values.insert("id".to_string(), request.id.clone());
        values
    }

    /// Current stored state of the targeted item, if any.
    pub(super) async fn fetch_original(
        &self,
        ctx: &RequestContext,
        request: &ItemOperationRequest,
    ) -> ResourceResult<Option<Item>> {
        let query = Query::new(Predicate::from_equalities(&self.lookup_values(request)))
            .with_window(Window::new(0, Some(1)));
        match self.resource.find(ctx, &query).await {
            Ok(list) => Ok(list.items.into_iter().next()),
            Err(ResourceError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Request payload as a document.
pub(super) fn payload_object(request: &ItemOperationRequest) -> ResourceResult<Map<String, Value>> {
    match &request.payload {
        Value::Object(object) => Ok(object.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(ResourceError::invalid_field(
            "Malformed body",
            "payload",
            "not an object",
        )),
    }
}
