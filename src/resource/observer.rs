//! Per-operation reporting sink.

use super::context::RequestContext;
use crate::error::ResourceError;
use log::debug;
use std::fmt;
use std::time::Duration;

/// Resource operation being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    MultiGet,
    Find,
    Reduce,
    Insert,
    Update,
    Delete,
    Clear,
    Count,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::MultiGet => "multi_get",
            Operation::Find => "find",
            Operation::Reduce => "reduce",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
            Operation::Count => "count",
        };
        f.write_str(name)
    }
}

/// Outcome of one resource operation.
#[derive(Debug)]
pub struct OperationEvent<'a> {
    pub ctx: &'a RequestContext,
    /// Path of the resource, e.g. `users.posts`
    pub resource: &'a str,
    pub operation: Operation,
    pub duration: Duration,
    /// Items returned or affected, when the operation succeeded
    pub found: Option<usize>,
    pub error: Option<&'a ResourceError>,
}

/// Receives an event after every resource operation.
pub trait Observer: Send + Sync {
    /// Skip building events altogether when false.
    fn enabled(&self) -> bool {
        true
    }

    fn record(&self, event: &OperationEvent<'_>);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn enabled(&self) -> bool {
        false
    }

    fn record(&self, _event: &OperationEvent<'_>) {}
}

/// Observer writing one debug line per operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn enabled(&self) -> bool {
        log::log_enabled!(log::Level::Debug)
    }

    fn record(&self, event: &OperationEvent<'_>) {
        match (event.error, event.found) {
            (Some(err), _) => debug!(
                "[{}] {}.{} failed after {:?}: {}",
                event.ctx.request_id, event.resource, event.operation, event.duration, err
            ),
            (None, Some(found)) => debug!(
                "[{}] {}.{} returned {} item(s) in {:?}",
                event.ctx.request_id, event.resource, event.operation, found, event.duration
            ),
            (None, None) => debug!(
                "[{}] {}.{} done in {:?}",
                event.ctx.request_id, event.resource, event.operation, event.duration
            ),
        }
    }
}
