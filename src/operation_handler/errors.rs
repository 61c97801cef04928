//! Error handling utilities for operation handlers
//!
//! Failures are rendered as `{"code": .., "message": .., "issues": ..}` with the
//! status code of the condition. `issues` is only present for validation failures.

use crate::{error::ResourceError, operation_handler::core::ItemOperationResponse};
use serde_json::{Map, Value};

/// Create an error response from a ResourceError.
pub fn create_error_response(error: &ResourceError) -> ItemOperationResponse {
    let status = error.status_code();
    let mut body = Map::new();
    body.insert("code".to_string(), Value::from(status));
    body.insert("message".to_string(), Value::from(error.to_string()));
    if let Some(issues) = error.issues().filter(|issues| !issues.is_empty()) {
        body.insert(
            "issues".to_string(),
            serde_json::to_value(issues).unwrap_or_default(),
        );
    }

    ItemOperationResponse {
        status,
        etag: None,
        last_modified: None,
        body: Some(Value::Object(body)),
    }
}
