//! Field validator capability and reference resolution seams.

use super::reference::Connection;
use super::types::{Field, Schema};
use crate::error::{CompileError, FieldError};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Contract implemented by every field validator.
///
/// Only [`validate`](FieldValidator::validate) is required. A validator that does not
/// override [`compile`](FieldValidator::compile) is treated as already compiled.
pub trait FieldValidator: fmt::Debug + Send + Sync {
    /// Check `value` and return its canonical form.
    fn validate(&self, value: &Value) -> Result<Value, FieldError>;

    /// Resolve references against the resource graph.
    ///
    /// Must be idempotent and must not leave partial state behind on failure.
    fn compile(&self, _checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        Ok(())
    }

    /// Encode a validated value for storage or output.
    fn serialize(&self, value: &Value) -> Result<Value, FieldError> {
        Ok(value.clone())
    }

    /// Nested field lookup for validators wrapping a schema.
    fn get_field(&self, _name: &str) -> Option<Field> {
        None
    }

    /// Set when the validator describes a sub-resource connection.
    fn connection(&self) -> Option<&Connection> {
        None
    }
}

/// Membership test over the identifiers currently stored by a resource.
pub trait IdentifierSet: Send + Sync {
    fn contains(&self, id: &Value) -> bool;
}

/// What a reference resolves to at compile time.
#[derive(Clone)]
pub struct ReferenceTarget {
    /// Live identifier set, `None` when the storage can't enumerate ids
    pub ids: Option<Arc<dyn IdentifierSet>>,
    /// Validator of the target's `id` field
    pub id_validator: Option<Arc<dyn FieldValidator>>,
    pub schema: Weak<Schema>,
}

impl fmt::Debug for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTarget")
            .field("enumerable", &self.ids.is_some())
            .field("id_validator", &self.id_validator)
            .finish()
    }
}

/// Resolves resource paths to reference targets.
pub trait ReferenceChecker: Send + Sync {
    fn reference_target(&self, path: &str) -> Option<ReferenceTarget>;
}

/// Checker that resolves nothing, for compiling standalone schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceChecker for NoReferences {
    fn reference_target(&self, _path: &str) -> Option<ReferenceTarget> {
        None
    }
}
