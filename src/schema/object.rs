//! Composite validators: nested objects, arrays and dicts.

use super::types::{Field, Schema, changes_from};
use super::validator::{FieldValidator, ReferenceChecker};
use crate::error::{CompileError, FieldError};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Validates a nested document against its own schema.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pub schema: Option<Arc<Schema>>,
}

impl Object {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Some(Arc::new(schema)),
        }
    }

    fn schema(&self) -> Result<&Schema, FieldError> {
        self.schema
            .as_deref()
            .ok_or_else(|| FieldError::invalid("no schema defined"))
    }
}

impl FieldValidator for Object {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let schema = self.schema()?;
        let object = value
            .as_object()
            .ok_or_else(|| FieldError::invalid("not an object"))?;

        // Nested documents are validated as a whole, read-only only applies at the root.
        schema
            .validate_document(&changes_from(object), &Map::new(), false)
            .map(Value::Object)
            .map_err(FieldError::Nested)
    }

    fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        match &self.schema {
            Some(schema) => schema.compile(checker),
            None => Err(CompileError::MissingSchema),
        }
    }

    fn serialize(&self, value: &Value) -> Result<Value, FieldError> {
        let schema = self.schema()?;
        match value {
            Value::Object(object) => schema
                .serialize(object)
                .map(Value::Object)
                .map_err(FieldError::Nested),
            _ => Err(FieldError::invalid("not an object")),
        }
    }

    fn get_field(&self, name: &str) -> Option<Field> {
        self.schema.as_ref()?.get_field(name).cloned()
    }
}

/// Validates every element of a list with the same field definition.
#[derive(Debug, Clone, Default)]
pub struct Array {
    /// Element definition, `None` accepts any element
    pub values: Option<Box<Field>>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl Array {
    pub fn of(values: Field) -> Self {
        Self {
            values: Some(Box::new(values)),
            ..Self::default()
        }
    }

    pub fn with_len(mut self, min_len: Option<usize>, max_len: Option<usize>) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    fn element_validator(&self) -> Option<&Arc<dyn FieldValidator>> {
        self.values.as_ref()?.validator.as_ref()
    }
}

impl FieldValidator for Array {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let items = value
            .as_array()
            .ok_or_else(|| FieldError::invalid("not an array"))?;

        let mut output = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.element_validator() {
                Some(validator) => {
                    let value = validator.validate(item).map_err(|e| {
                        FieldError::invalid(format!("invalid value at #{}: {e}", i + 1))
                    })?;
                    output.push(value);
                }
                None => output.push(item.clone()),
            }
        }

        if let Some(min) = self.min_len {
            if output.len() < min {
                return Err(FieldError::invalid(format!("has fewer items than {min}")));
            }
        }
        if let Some(max) = self.max_len {
            if output.len() > max {
                return Err(FieldError::invalid(format!("has more items than {max}")));
            }
        }

        Ok(Value::Array(output))
    }

    fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        match self.element_validator() {
            Some(validator) => validator.compile(checker),
            None => Ok(()),
        }
    }

    fn serialize(&self, value: &Value) -> Result<Value, FieldError> {
        let (Some(validator), Value::Array(items)) = (self.element_validator(), value) else {
            return Ok(value.clone());
        };
        items
            .iter()
            .map(|item| validator.serialize(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn get_field(&self, name: &str) -> Option<Field> {
        self.element_validator()?.get_field(name)
    }
}

/// Free-form object whose values share one field definition.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    pub values: Option<Box<Field>>,
}

impl FieldValidator for Dict {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let object = value
            .as_object()
            .ok_or_else(|| FieldError::invalid("not a dict"))?;
        let Some(validator) = self.values.as_ref().and_then(|f| f.validator.as_ref()) else {
            return Ok(value.clone());
        };

        let mut output = Map::with_capacity(object.len());
        for (key, item) in object {
            let item = validator
                .validate(item)
                .map_err(|e| FieldError::invalid(format!("invalid value for key '{key}': {e}")))?;
            output.insert(key.clone(), item);
        }
        Ok(Value::Object(output))
    }

    fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        match self.values.as_ref().and_then(|f| f.validator.as_ref()) {
            Some(validator) => validator.compile(checker),
            None => Ok(()),
        }
    }
}
