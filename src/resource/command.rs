//! Named actions executed against a single item.

use super::context::RequestContext;
use super::item::Item;
use crate::error::ResourceResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Result of a command: the possibly modified item and a free-form response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub item: Item,
    pub response: Value,
}

/// An action registered on a resource under a name.
///
/// `execute` receives a copy of the stored item. Changes to its payload are
/// validated and persisted by the caller; returning the item untouched leaves
/// storage alone.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(
        &self,
        ctx: &RequestContext,
        item: Item,
        payload: Map<String, Value>,
    ) -> ResourceResult<CommandOutcome>;
}

/// Check a command name: non-empty, letters, digits, `_` and `-` only.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
