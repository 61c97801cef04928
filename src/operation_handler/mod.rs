//! Framework-agnostic item operation handler.
//!
//! This module provides structured request/response handling for operations on a
//! single item, with built-in ETag concurrency control and conditional requests.
//!
//! # Key Types
//!
//! - [`ItemOperationHandler`] - Runs the item flows of one resource
//! - [`ItemOperationRequest`] - Operation, id, payload and conditional tokens
//! - [`ItemOperationResponse`] - Status, etag and body
//!
//! # Examples
//!
//! ```rust
//! use resource_layer::operation_handler::{ItemOperationHandler, ItemOperationRequest};
//! use resource_layer::resource::{Conf, Index, RequestContext};
//! use resource_layer::schema::{Field, Schema, Text, id_field};
//! use resource_layer::storage::InMemoryStorage;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut index = Index::new();
//! let schema = Schema::new("users")
//!     .field("id", id_field())
//!     .field("name", Field::new(Text::default()));
//! index
//!     .bind("users", schema, Some(Arc::new(InMemoryStorage::new())), Conf::default())
//!     .unwrap();
//! index.compile().unwrap();
//!
//! let handler = ItemOperationHandler::new(index.resource("users").unwrap());
//! let ctx = RequestContext::default();
//! let created = handler
//!     .execute(&ctx, ItemOperationRequest::put("u1", json!({"name": "Ann"})))
//!     .await
//!     .unwrap();
//! assert_eq!(created.status, 201);
//!
//! let etag = created.etag.unwrap();
//! let cached = handler
//!     .execute(&ctx, ItemOperationRequest::get("u1").if_none_match(etag.to_header()))
//!     .await
//!     .unwrap();
//! assert_eq!(cached.status, 304);
//! # });
//! ```

mod builders;
mod core;
mod errors;
mod handlers;

pub use self::core::{
    ItemOperationHandler, ItemOperationRequest, ItemOperationResponse, ItemOperationType,
    Preconditions,
};

pub use errors::create_error_response;
