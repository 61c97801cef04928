//! Per-resource configuration.

use serde::{Deserialize, Serialize};

/// Kind of access a request needs on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Insert a new item
    Create,
    /// Read a single item
    Read,
    /// Partially modify an item
    Update,
    /// Replace an item as a whole
    Replace,
    /// Delete a single item
    Delete,
    /// Delete every item matching a query
    Clear,
    /// List items
    List,
}

/// Every mode.
pub const READ_WRITE: &[Mode] = &[
    Mode::Create,
    Mode::Read,
    Mode::Update,
    Mode::Replace,
    Mode::Delete,
    Mode::Clear,
    Mode::List,
];

/// Modes that never modify stored items.
pub const READ_ONLY: &[Mode] = &[Mode::Read, Mode::List];

/// Modes that never expose stored items.
pub const WRITE_ONLY: &[Mode] = &[
    Mode::Create,
    Mode::Update,
    Mode::Replace,
    Mode::Delete,
    Mode::Clear,
];

/// Operations a resource accepts and how it pages connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conf {
    pub allowed_modes: Vec<Mode>,
    /// Page size used when a connection is projected without a limit
    pub pagination_default_limit: Option<usize>,
}

impl Conf {
    pub fn new(allowed_modes: &[Mode]) -> Self {
        Self {
            allowed_modes: allowed_modes.to_vec(),
            pagination_default_limit: None,
        }
    }

    pub fn read_write() -> Self {
        Self::new(READ_WRITE)
    }

    pub fn read_only() -> Self {
        Self::new(READ_ONLY)
    }

    pub fn write_only() -> Self {
        Self::new(WRITE_ONLY)
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.pagination_default_limit = Some(limit);
        self
    }

    pub fn is_mode_allowed(&self, mode: Mode) -> bool {
        self.allowed_modes.contains(&mode)
    }
}

impl Default for Conf {
    fn default() -> Self {
        Self::read_write()
    }
}
