//! Storage-agnostic resource layer for Rust.
//!
//! Declares resources (named collections of documents with a schema, a storage
//! backend and a configuration), validates documents against their schema and
//! runs every read and write through a pipeline of event hooks and middleware
//! around the storage call. Writes are protected by ETag based optimistic
//! concurrency.
//!
//! # Core Components
//!
//! - [`Schema`] - Field definitions, document preparation and validation
//! - [`Index`] / [`Resource`] - The resource graph and its operation pipeline
//! - [`Storer`] - Trait for implementing storage backends
//! - [`ItemOperationHandler`] - Conditional get/put/patch/delete/command flows
//!
//! # Quick Start
//!
//! ```rust
//! use resource_layer::resource::{Conf, Index, Item, RequestContext};
//! use resource_layer::schema::{Field, Integer, Schema, Text, id_field};
//! use resource_layer::storage::InMemoryStorage;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::new("counters")
//!     .field("id", id_field())
//!     .field("name", Field::new(Text::default()).required())
//!     .field("count", Field::new(Integer::default()).with_default(json!(0)));
//!
//! let mut index = Index::new();
//! index
//!     .bind("counters", schema, Some(Arc::new(InMemoryStorage::new())), Conf::default())
//!     .unwrap();
//! index.compile().unwrap();
//!
//! let counters = index.resource("counters").unwrap();
//! let ctx = RequestContext::default();
//! let payload = json!({"name": "visits"}).as_object().cloned().unwrap();
//! let (changes, base) = counters.schema().prepare(&ctx, &payload, None, false);
//! let doc = counters.schema().validate(&changes, &base).unwrap();
//! assert_eq!(doc["count"], json!(0));
//!
//! let stored = counters.insert(&ctx, vec![Item::new(doc).unwrap()]).await.unwrap();
//! let fetched = counters.get(&ctx, &stored[0].id).await.unwrap();
//! assert_eq!(fetched.etag, stored[0].etag);
//! # });
//! ```

pub mod error;
pub mod operation_handler;
pub mod query;
pub mod resource;
pub mod schema;
pub mod storage;

// Re-export commonly used types for convenience
pub use error::{ResourceError, ResourceResult};
pub use operation_handler::{ItemOperationHandler, ItemOperationRequest, ItemOperationResponse};
pub use query::{Predicate, Projection, Query};
pub use resource::{Conf, ETag, Index, Item, ItemList, Mode, RequestContext, Resource};
pub use schema::{Field, FieldValidator, Schema};
pub use storage::{InMemoryStorage, Storer};
