//! List model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle of the built-in subscriber list type.
pub const SUBSCRIBER_LIST_TYPE: &str = "subscriber";

/// Unique identifier for a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListId(pub i64);

impl ListId {
    /// Create a new list ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, typed collection that subscribers can join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    /// Unique identifier.
    pub id: ListId,
    /// Host content element this list is registered as, if any.
    pub element_id: Option<i64>,
    /// List type handle (`subscriber` for the built-in type).
    pub list_type: String,
    /// Display name.
    pub name: String,
    /// Handle, unique within the list type.
    pub handle: String,
    /// Cached number of subscribers, recomputed after every membership change.
    pub total_subscribers: u32,
    /// When the list was created.
    pub created_at: DateTime<Utc>,
    /// When the list was last written.
    pub updated_at: DateTime<Utc>,
}

impl List {
    /// Label shown for this list in pickers.
    ///
    /// Falls back to the handle for lists created on the fly without a name.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.handle
        } else {
            &self.name
        }
    }
}
