//! Subscriber model types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::list::ListId;
use crate::{Error, Result};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub i64);

impl SubscriberId {
    /// Create a new subscriber ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a user account in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserRef(pub i64);

impl UserRef {
    /// Create a new user reference.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize an email address for storage and lookup.
///
/// Returns `None` for blank input.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        None
    } else {
        Some(email.to_lowercase())
    }
}

/// The fields a subscriber can be identified by.
///
/// The user reference is the primary key when present, the email
/// address otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberIdentity {
    /// Host user account.
    pub user_ref: Option<UserRef>,
    /// Normalized email address.
    pub email: Option<String>,
}

impl SubscriberIdentity {
    /// Build an identity, normalizing the email address.
    #[must_use]
    pub fn new(user_ref: Option<UserRef>, email: Option<&str>) -> Self {
        Self {
            user_ref,
            email: email.and_then(normalize_email),
        }
    }

    /// Identity keyed on an email address only.
    #[must_use]
    pub fn from_email(email: &str) -> Self {
        Self::new(None, Some(email))
    }

    /// Identity keyed on a host user only.
    #[must_use]
    pub const fn from_user(user_ref: UserRef) -> Self {
        Self {
            user_ref: Some(user_ref),
            email: None,
        }
    }

    /// Returns true if neither field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.user_ref.is_none() && self.email.is_none()
    }

    /// Drop the user reference unless user sync is enabled.
    #[must_use]
    pub fn with_user_sync(self, enabled: bool) -> Self {
        if enabled {
            self
        } else {
            Self {
                user_ref: None,
                email: self.email,
            }
        }
    }

    /// Ensure at least one identity field is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if both fields are empty.
    pub fn validate(self) -> Result<Self> {
        if self.is_empty() {
            Err(Error::InvalidIdentity)
        } else {
            Ok(self)
        }
    }
}

/// A person who can join lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Unique identifier.
    pub id: SubscriberId,
    /// Host user account, if the subscriber is synced with one.
    pub user_ref: Option<UserRef>,
    /// Email address.
    pub email: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// When the subscriber was created.
    pub created_at: DateTime<Utc>,
    /// When the subscriber was last written.
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Returns the identity fields of this subscriber.
    #[must_use]
    pub fn identity(&self) -> SubscriberIdentity {
        SubscriberIdentity {
            user_ref: self.user_ref,
            email: self.email.clone(),
        }
    }

    /// Returns a display string for the subscriber.
    ///
    /// "First Last <email>" when a name is known, otherwise the email,
    /// otherwise the user reference.
    #[must_use]
    pub fn display(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        match (&self.email, name.is_empty()) {
            (Some(email), true) => email.clone(),
            (Some(email), false) => format!("{name} <{email}>"),
            (None, false) => name,
            (None, true) => self
                .user_ref
                .map_or_else(String::new, |user| format!("user #{user}")),
        }
    }
}

/// Values used to create or update a subscriber together with the
/// complete set of lists it should belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberDraft {
    /// Existing subscriber to update, `None` to create a new one.
    pub id: Option<SubscriberId>,
    /// Identity fields.
    pub identity: SubscriberIdentity,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Lists the subscriber belongs to after saving.
    pub list_ids: BTreeSet<ListId>,
}
