//! Resources: items, their lifecycle pipeline and the graph they form.
//!
//! # Key Components
//!
//! * [`Index`] - Root of the resource graph, compiled once before serving
//! * [`Resource`] - Schema, storage, hooks and middleware for one collection
//! * [`Item`] - A stored document with its id, etag and update time
//! * [`RequestContext`] - Request id, deadline and cancellation
//! * [`EventHandler`] / [`Middleware`] - Extension points around storage calls
//! * [`Observer`] - Per-operation reporting sink

pub mod command;
pub mod conf;
pub mod context;
pub mod etag;
pub mod hooks;
pub mod index;
pub mod item;
pub mod middleware;
pub mod observer;
#[allow(clippy::module_inception)]
pub mod resource;

pub use command::{Command, CommandOutcome};
pub use conf::{Conf, Mode, READ_ONLY, READ_WRITE, WRITE_ONLY};
pub use context::{CancelHandle, RequestContext};
pub use etag::{ETag, ETagError, header_matches};
pub use hooks::{
    ClearEventHandler, DeleteEventHandler, EventHandler, FindEventHandler, GetEventHandler,
    Hooks, InsertEventHandler, UpdateEventHandler,
};
pub use index::Index;
pub use item::{Item, ItemList};
pub use middleware::{
    ClearHandler, DeleteHandler, FindHandler, GetHandler, InsertHandler, Interceptor, Middleware,
    ReduceHandler, Reducer, UpdateHandler, clear_handler, delete_handler, find_handler,
    get_handler, insert_handler, update_handler,
};
pub use observer::{LogObserver, NoopObserver, Observer, Operation, OperationEvent};
pub use resource::{Resource, ResourceValidator};
