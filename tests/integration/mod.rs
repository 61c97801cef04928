//! Scenario tests against a compiled resource graph.
//!
//! - `pipeline` - hook ordering, error rewriting, multi-get aggregation, totals
//! - `middleware` - interceptor ordering and short-circuiting
//! - `concurrency` - optimistic concurrency between racing writers
//! - `item_operations` - conditional get/put/patch/delete and commands
//! - `references` - reference validation, compile order and projection
//! - `cancellation` - deadlines and cancellation of in-flight storage calls
//! - `etag_properties` - content hash properties over generated payloads

pub mod cancellation;
pub mod concurrency;
pub mod etag_properties;
pub mod item_operations;
pub mod references;
