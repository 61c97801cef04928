//! Ready made field definitions for identity and timestamps.

use super::leaf::{Text, Time};
use super::types::Field;
use serde_json::Value;
use uuid::Uuid;

/// Read-only, required `id` field generating a UUID v4 when none is supplied.
pub fn id_field() -> Field {
    Field::new(Text::default())
        .required()
        .read_only()
        .with_description("The item's id")
        .on_init(|_ctx, value| {
            value
                .cloned()
                .unwrap_or_else(|| Value::String(Uuid::new_v4().to_string()))
        })
}

/// Read-only creation timestamp set once.
pub fn created_field() -> Field {
    Field::new(Time)
        .required()
        .read_only()
        .with_description("The time at which the item has been inserted")
        .on_init(|_ctx, _value| Time::now())
}

/// Read-only timestamp refreshed on every write.
pub fn updated_field() -> Field {
    Field::new(Time)
        .required()
        .read_only()
        .with_description("The time at which the item has been last updated")
        .on_init(|_ctx, _value| Time::now())
        .on_update(|_ctx, _value| Time::now())
}
