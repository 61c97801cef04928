//! Stored document envelope.

use super::etag::ETag;
use crate::error::{ResourceError, ResourceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: identity, content hash, timestamp and validated payload.
///
/// The `etag` always matches the payload right after a successful write. Readers
/// must not change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Value,
    pub etag: ETag,
    pub updated: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Item {
    /// Build an item from a validated payload.
    ///
    /// The id is read from the payload `id` field and the update time from its
    /// `updated` field when present.
    pub fn new(payload: Map<String, Value>) -> ResourceResult<Self> {
        let id = payload
            .get("id")
            .filter(|id| !id.is_null())
            .cloned()
            .ok_or_else(|| ResourceError::unknown("nil ID"))?;

        let updated = payload
            .get("updated")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let etag = ETag::from_payload(&payload)?;
        Ok(Self {
            id,
            etag,
            updated,
            payload,
        })
    }

    /// Recompute the etag from the current payload.
    pub fn recalc_etag(&mut self) -> ResourceResult<()> {
        self.etag = ETag::from_payload(&self.payload)?;
        Ok(())
    }

    /// Payload value of `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}

/// A page of items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    /// Number of items matching the query, `None` when the storage did not count
    pub total: Option<usize>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub items: Vec<Item>,
}

impl ItemList {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            total: Some(items.len()),
            offset: 0,
            limit: None,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
