//! Content hashes used as optimistic concurrency and cache validation tokens.
//!
//! An [`ETag`] is derived from a document payload: the payload is encoded as JSON
//! (object keys are ordered, so equal payloads encode identically), hashed with
//! SHA-256 and base64 encoded.
//!
//! ```rust
//! use resource_layer::resource::ETag;
//! use serde_json::json;
//!
//! let payload = json!({"id": "1", "name": "john"});
//! let etag = ETag::from_payload(payload.as_object().unwrap()).unwrap();
//!
//! // Conditional request headers carry the tag quoted, weak or strong.
//! let header: ETag = format!("W/\"{}\"", etag.as_str()).parse().unwrap();
//! assert_eq!(header, etag);
//! ```

use crate::error::{ResourceError, ResourceResult};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Opaque content hash of an item payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Hash a payload.
    pub fn from_payload(payload: &Map<String, Value>) -> ResourceResult<Self> {
        let encoded =
            serde_json::to_vec(&canonical_object(payload)).map_err(ResourceError::unknown)?;
        Ok(Self::from_content(&encoded))
    }

    /// Hash raw bytes.
    pub fn from_content(content: &[u8]) -> Self {
        let hash = Sha256::digest(content);
        Self(BASE64.encode(hash))
    }

    /// Wrap a tag computed elsewhere, such as a storage specific version.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header form, `"<hash>"`.
    pub fn to_header(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Key order must not depend on how the map was built.
fn canonical_object(object: &Map<String, Value>) -> Value {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    Value::Object(
        keys.into_iter()
            .map(|k| (k.clone(), canonical(&object[k])))
            .collect(),
    )
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(object) => canonical_object(object),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Errors raised while parsing an ETag header token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ETagError {
    #[error("Invalid ETag format: {0}")]
    InvalidFormat(String),
}

impl FromStr for ETag {
    type Err = ETagError;

    /// Parse a quoted header token, weak (`W/"x"`) or strong (`"x"`).
    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let trimmed = header.trim();
        let value = trimmed.strip_prefix("W/").unwrap_or(trimmed);

        let opaque = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ETagError::InvalidFormat(header.to_string()))?;

        Ok(Self(opaque.to_string()))
    }
}

/// Whether a conditional header value (`*`, a tag list or a bare tag) matches `etag`.
pub fn header_matches(header: &str, etag: &ETag) -> bool {
    header.split(',').map(str::trim).any(|token| {
        token == "*"
            || token.parse::<ETag>().is_ok_and(|t| &t == etag)
            || token == etag.as_str()
    })
}
