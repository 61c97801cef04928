//! Cross-resource references and sub-resource connections.

use super::types::{Field, Schema};
use super::validator::{FieldValidator, ReferenceChecker, ReferenceTarget};
use crate::error::{CompileError, FieldError};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Validates that a value identifies an existing item of another resource.
///
/// The target is resolved once by [`compile`](FieldValidator::compile) and cached.
/// Until then every validation fails with `not compiled`. Clones share the
/// resolution, so compiling any of them compiles all.
#[derive(Debug, Clone, Default)]
pub struct Reference {
    /// Dotted path of the target resource, such as `users` or `users.posts`
    pub path: String,
    target: Arc<OnceLock<ReferenceTarget>>,
}

impl Reference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: Arc::default(),
        }
    }

    /// Schema of the referenced resource once compiled.
    pub fn target_schema(&self) -> Option<Arc<Schema>> {
        self.target.get()?.schema.upgrade()
    }
}

impl FieldValidator for Reference {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let target = self
            .target
            .get()
            .ok_or_else(|| FieldError::invalid("not compiled"))?;

        let id = match &target.id_validator {
            Some(validator) => validator.validate(value)?,
            None => value.clone(),
        };

        if let Some(ids) = &target.ids {
            if !ids.contains(&id) {
                return Err(FieldError::invalid("not found"));
            }
        }

        Ok(id)
    }

    fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        let target =
            checker
                .reference_target(&self.path)
                .ok_or_else(|| CompileError::UnresolvedReference {
                    path: self.path.clone(),
                })?;
        // A second compile keeps the first resolution.
        let _ = self.target.set(target);
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Field> {
        self.target_schema()?.get_field(name).cloned()
    }
}

/// Read-only field exposing a sub-resource through its parent.
///
/// Created when a sub-resource is bound. Values are produced by projection,
/// never written by callers.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Name of the sub-resource relative to its parent
    pub resource: String,
    /// Field of the sub-resource holding the parent id
    pub field: String,
    pub schema: Arc<Schema>,
}

impl FieldValidator for Connection {
    fn validate(&self, _value: &Value) -> Result<Value, FieldError> {
        Err(FieldError::invalid("read-only"))
    }

    fn get_field(&self, name: &str) -> Option<Field> {
        self.schema.get_field(name).cloned()
    }

    fn connection(&self) -> Option<&Connection> {
        Some(self)
    }
}
