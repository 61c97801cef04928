//! Document preparation, validation and compilation.
//!
//! Writes go through two steps: [`Schema::prepare`] splits an incoming payload into
//! pending [`Changes`] and a base document, then [`Schema::validate`] merges both and
//! runs every field validator over the result.

use super::types::{Change, Changes, Schema};
use super::validator::ReferenceChecker;
use crate::error::{CompileError, FieldErrors};
use crate::resource::RequestContext;
use log::trace;
use serde_json::{Map, Value};

impl Schema {
    /// Compile every field validator against the resource graph.
    pub fn compile(&self, checker: &dyn ReferenceChecker) -> Result<(), CompileError> {
        for (name, field) in &self.fields {
            if let Some(validator) = &field.validator {
                validator
                    .compile(checker)
                    .map_err(|e| CompileError::in_field(name, e))?;
            }
        }
        Ok(())
    }

    /// Split `payload` into pending changes and a base document.
    ///
    /// With no `original` the payload is a creation: defaults and `on_init` values
    /// fill the base for omitted fields. Otherwise the base is the original document,
    /// unchanged values are dropped from the changes and `on_update` values are
    /// written to the base. In `replace` mode, writable fields missing from the
    /// payload are tombstoned.
    pub fn prepare(
        &self,
        ctx: &RequestContext,
        payload: &Map<String, Value>,
        original: Option<&Map<String, Value>>,
        replace: bool,
    ) -> (Changes, Map<String, Value>) {
        let mut changes = Changes::new();
        let mut base = original.cloned().unwrap_or_default();

        for (name, field) in &self.fields {
            let value = payload.get(name);
            match original {
                None => match (value, &field.on_init) {
                    (Some(value), Some(init)) => {
                        changes.insert(name.clone(), Change::Set(init(ctx, Some(value))));
                    }
                    (Some(value), None) => {
                        changes.insert(name.clone(), Change::Set(value.clone()));
                    }
                    (None, Some(init)) => {
                        base.insert(name.clone(), init(ctx, None));
                    }
                    (None, None) => {
                        if let Some(default) = &field.default {
                            base.insert(name.clone(), default.clone());
                        }
                    }
                },
                Some(original) => {
                    if let Some(hook) = &field.on_update {
                        base.insert(name.clone(), hook(ctx, original.get(name)));
                    }
                    match value {
                        Some(value) if original.get(name) != Some(value) => {
                            changes.insert(name.clone(), Change::Set(value.clone()));
                        }
                        Some(_) => {}
                        None if replace && !field.read_only && original.contains_key(name) => {
                            changes.insert(name.clone(), Change::Tombstone);
                        }
                        None => {}
                    }
                }
            }
        }

        // Unknown fields are kept so validation can reject them.
        for (name, value) in payload {
            if !self.fields.contains_key(name) {
                changes.insert(name.clone(), Change::Set(value.clone()));
            }
        }

        trace!(
            "prepared {} change(s) over a base of {} field(s)",
            changes.len(),
            base.len()
        );
        (changes, base)
    }

    /// Merge `changes` over `base` and validate the resulting document.
    ///
    /// Errors from every field are collected before returning.
    pub fn validate(
        &self,
        changes: &Changes,
        base: &Map<String, Value>,
    ) -> Result<Map<String, Value>, FieldErrors> {
        self.validate_document(changes, base, true)
    }

    pub(crate) fn validate_document(
        &self,
        changes: &Changes,
        base: &Map<String, Value>,
        check_read_only: bool,
    ) -> Result<Map<String, Value>, FieldErrors> {
        let mut errors = FieldErrors::new();

        for (name, field) in &self.fields {
            let change = changes.get(name);

            if check_read_only && field.read_only {
                let rewritten = match change {
                    Some(Change::Set(value)) => base.get(name) != Some(value),
                    Some(Change::Tombstone) => base.contains_key(name),
                    None => false,
                };
                if rewritten {
                    errors.add(name, "read-only");
                }
            }

            if field.required {
                let present = match change {
                    Some(Change::Set(value)) => !value.is_null(),
                    Some(Change::Tombstone) => false,
                    None => base.get(name).is_some_and(|v| !v.is_null()),
                };
                if !present {
                    errors.add(name, "required");
                }
            }
        }

        let mut doc = base.clone();
        for (name, change) in changes {
            match change {
                Change::Set(value) => {
                    doc.insert(name.clone(), value.clone());
                }
                Change::Tombstone => {
                    doc.remove(name);
                }
            }
        }

        for (name, value) in doc.iter_mut() {
            let Some(field) = self.fields.get(name) else {
                errors.add(name, "invalid field");
                continue;
            };
            let Some(validator) = &field.validator else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match validator.validate(value) {
                Ok(validated) => *value = validated,
                Err(e) => errors.push(name, e),
            }
        }

        if errors.is_empty() {
            Ok(doc)
        } else {
            Err(errors)
        }
    }

    /// Encode a validated document for storage or output.
    pub fn serialize(&self, payload: &Map<String, Value>) -> Result<Map<String, Value>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut output = Map::with_capacity(payload.len());

        for (name, value) in payload {
            let validator = self.fields.get(name).and_then(|f| f.validator.as_ref());
            match validator {
                Some(validator) if !value.is_null() => match validator.serialize(value) {
                    Ok(serialized) => {
                        output.insert(name.clone(), serialized);
                    }
                    Err(e) => errors.push(name, e),
                },
                _ => {
                    output.insert(name.clone(), value.clone());
                }
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}
