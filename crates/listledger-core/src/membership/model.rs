//! Membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::list::ListId;
use crate::subscriber::SubscriberId;

/// A subscriber's membership of one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Row identifier.
    pub id: i64,
    /// The list joined.
    pub list_id: ListId,
    /// The subscriber who joined.
    pub subscriber_id: SubscriberId,
    /// When the subscriber joined.
    pub created_at: DateTime<Utc>,
}
