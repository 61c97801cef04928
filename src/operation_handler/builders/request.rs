//! Request builder utilities for ItemOperationRequest

use crate::{
    operation_handler::core::{ItemOperationRequest, ItemOperationType, Preconditions},
    query::Projection,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

impl ItemOperationRequest {
    fn new(operation: ItemOperationType, id: impl Into<Value>, payload: Value) -> Self {
        Self {
            operation,
            id: id.into(),
            lookup: Map::new(),
            payload,
            projection: Projection::default(),
            preconditions: Preconditions::default(),
            prefer_no_content: false,
            command: None,
        }
    }

    /// Create a new get operation request.
    pub fn get(id: impl Into<Value>) -> Self {
        Self::new(ItemOperationType::Get, id, Value::Null)
    }

    /// Create a new put (create or replace) operation request.
    pub fn put(id: impl Into<Value>, payload: Value) -> Self {
        Self::new(ItemOperationType::Put, id, payload)
    }

    /// Create a new patch operation request.
    pub fn patch(id: impl Into<Value>, payload: Value) -> Self {
        Self::new(ItemOperationType::Patch, id, payload)
    }

    /// Create a new delete operation request.
    pub fn delete(id: impl Into<Value>) -> Self {
        Self::new(ItemOperationType::Delete, id, Value::Null)
    }

    /// Create a new command operation request.
    pub fn command(id: impl Into<Value>, name: impl Into<String>, payload: Value) -> Self {
        let mut request = Self::new(ItemOperationType::Command, id, payload);
        request.command = Some(name.into());
        request
    }

    /// Fix a field to a value derived from the item's location.
    pub fn with_lookup(mut self, field: impl Into<String>, value: Value) -> Self {
        self.lookup.insert(field.into(), value);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.preconditions.if_match = Some(etag.into());
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.preconditions.if_none_match = Some(etag.into());
        self
    }

    pub fn if_modified_since(mut self, time: DateTime<Utc>) -> Self {
        self.preconditions.if_modified_since = Some(time);
        self
    }

    pub fn if_unmodified_since(mut self, time: DateTime<Utc>) -> Self {
        self.preconditions.if_unmodified_since = Some(time);
        self
    }

    /// Ask for an empty body when the returned document would be unchanged.
    pub fn prefer_no_content(mut self) -> Self {
        self.prefer_no_content = true;
        self
    }
}
