//! Core schema type definitions.
//!
//! A [`Schema`] is a set of named [`Field`]s. Each field optionally carries a
//! [`FieldValidator`] plus the flags that drive document preparation and validation.

use super::validator::FieldValidator;
use crate::resource::RequestContext;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Value hook run while preparing a document.
///
/// Receives the value currently known for the field (payload value on create,
/// original value on update) and returns the value to store.
pub type FieldHook = Arc<dyn Fn(&RequestContext, Option<&Value>) -> Value + Send + Sync>;

/// Named read-time parameters accepted by a field.
pub type Params = BTreeMap<String, Param>;

/// A typed option accepted by a field at read time, such as `limit` on a connection.
#[derive(Clone)]
pub struct Param {
    pub description: String,
    pub validator: Arc<dyn FieldValidator>,
}

impl Param {
    pub fn new(description: impl Into<String>, validator: impl FieldValidator + 'static) -> Self {
        Self {
            description: description.into(),
            validator: Arc::new(validator),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("description", &self.description)
            .field("validator", &self.validator)
            .finish()
    }
}

/// Definition of a document field.
#[derive(Clone, Default)]
pub struct Field {
    pub description: String,
    /// Field must be present and non-null in the validated document
    pub required: bool,
    /// Field can't be written by callers once set
    pub read_only: bool,
    /// Value used on create when the payload omits the field
    pub default: Option<Value>,
    /// Hook run on create, takes precedence over `default`
    pub on_init: Option<FieldHook>,
    /// Hook run on every update
    pub on_update: Option<FieldHook>,
    /// Value validator, `None` accepts anything
    pub validator: Option<Arc<dyn FieldValidator>>,
    pub params: Params,
}

impl Field {
    /// Create a field validated by `validator`.
    pub fn new(validator: impl FieldValidator + 'static) -> Self {
        Self {
            validator: Some(Arc::new(validator)),
            ..Self::default()
        }
    }

    /// Create a field sharing an already allocated validator.
    pub fn with_validator(validator: Arc<dyn FieldValidator>) -> Self {
        Self {
            validator: Some(validator),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(hook));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, param: Param) -> Self {
        self.params.insert(name.into(), param);
        self
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("description", &self.description)
            .field("required", &self.required)
            .field("read_only", &self.read_only)
            .field("default", &self.default)
            .field("on_init", &self.on_init.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("validator", &self.validator)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A set of fields describing a document.
///
/// ```
/// use resource_layer::schema::{Field, Integer, Schema, Text};
///
/// let schema = Schema::new("a counter")
///     .field("name", Field::new(Text::default()).required())
///     .field("count", Field::new(Integer::default()));
/// assert!(schema.get_field("count").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub description: String,
    pub fields: BTreeMap<String, Field>,
}

impl Schema {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add or replace a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Look up a field definition by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }
}

/// A pending write produced by [`Schema::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set(Value),
    /// Remove the field from the document
    Tombstone,
}

/// Pending writes keyed by field name.
pub type Changes = BTreeMap<String, Change>;

/// Build a change set that sets every entry of `payload`.
pub fn changes_from(payload: &Map<String, Value>) -> Changes {
    payload
        .iter()
        .map(|(name, value)| (name.clone(), Change::Set(value.clone())))
        .collect()
}
