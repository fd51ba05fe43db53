//! Requests accepted by the subscription service.

use serde::{Deserialize, Serialize};

use crate::list::{ListId, SUBSCRIBER_LIST_TYPE};
use crate::subscriber::{SubscriberIdentity, UserRef};

/// Add a subscriber to a list, creating either on first contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// List type handle.
    pub list_type: String,
    /// List handle.
    pub list_handle: String,
    /// Host content element to attach to a newly created list.
    pub element_id: Option<i64>,
    /// Host user subscribing.
    pub user_ref: Option<UserRef>,
    /// Email address subscribing.
    pub email: Option<String>,
}

impl SubscribeRequest {
    /// Subscribe to a list of the built-in subscriber type.
    #[must_use]
    pub fn new(list_handle: impl Into<String>) -> Self {
        Self {
            list_type: SUBSCRIBER_LIST_TYPE.to_string(),
            list_handle: list_handle.into(),
            element_id: None,
            user_ref: None,
            email: None,
        }
    }

    /// Set the list type.
    #[must_use]
    pub fn list_type(mut self, list_type: impl Into<String>) -> Self {
        self.list_type = list_type.into();
        self
    }

    /// Set the element a new list is attached to.
    #[must_use]
    pub fn element(mut self, element_id: i64) -> Self {
        self.element_id = Some(element_id);
        self
    }

    /// Set the subscribing user.
    #[must_use]
    pub fn user(mut self, user_ref: UserRef) -> Self {
        self.user_ref = Some(user_ref);
        self
    }

    /// Set the subscribing email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Identity of the subscriber.
    #[must_use]
    pub fn identity(&self) -> SubscriberIdentity {
        SubscriberIdentity::new(self.user_ref, self.email.as_deref())
    }
}

/// Remove a subscriber from a list.
///
/// The list is addressed by id when one is given, by type and handle
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// List ID.
    pub list_id: Option<ListId>,
    /// List type handle.
    pub list_type: String,
    /// List handle.
    pub list_handle: String,
    /// Host user unsubscribing.
    pub user_ref: Option<UserRef>,
    /// Email address unsubscribing.
    pub email: Option<String>,
}

impl UnsubscribeRequest {
    /// Unsubscribe from a list of the built-in subscriber type.
    #[must_use]
    pub fn new(list_handle: impl Into<String>) -> Self {
        Self {
            list_id: None,
            list_type: SUBSCRIBER_LIST_TYPE.to_string(),
            list_handle: list_handle.into(),
            user_ref: None,
            email: None,
        }
    }

    /// Unsubscribe from the list with the given id.
    #[must_use]
    pub fn by_id(list_id: ListId) -> Self {
        Self {
            list_id: Some(list_id),
            ..Self::new("")
        }
    }

    /// Set the list type.
    #[must_use]
    pub fn list_type(mut self, list_type: impl Into<String>) -> Self {
        self.list_type = list_type.into();
        self
    }

    /// Set the unsubscribing user.
    #[must_use]
    pub fn user(mut self, user_ref: UserRef) -> Self {
        self.user_ref = Some(user_ref);
        self
    }

    /// Set the unsubscribing email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Identity of the subscriber.
    #[must_use]
    pub fn identity(&self) -> SubscriberIdentity {
        SubscriberIdentity::new(self.user_ref, self.email.as_deref())
    }
}

/// Ask whether a subscriber belongs to a list.
///
/// Without a list type the first list created with the handle is used,
/// whatever its type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionQuery {
    /// List type handle, if the list should be matched on it.
    pub list_type: Option<String>,
    /// List handle.
    pub list_handle: String,
    /// Host user.
    pub user_ref: Option<UserRef>,
    /// Email address.
    pub email: Option<String>,
}

impl SubscriptionQuery {
    /// Query membership of the list with the given handle.
    #[must_use]
    pub fn new(list_handle: impl Into<String>) -> Self {
        Self {
            list_handle: list_handle.into(),
            ..Self::default()
        }
    }

    /// Match the list on its type as well as its handle.
    #[must_use]
    pub fn list_type(mut self, list_type: impl Into<String>) -> Self {
        self.list_type = Some(list_type.into());
        self
    }

    /// Set the user.
    #[must_use]
    pub fn user(mut self, user_ref: UserRef) -> Self {
        self.user_ref = Some(user_ref);
        self
    }

    /// Set the email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Identity of the subscriber.
    #[must_use]
    pub fn identity(&self) -> SubscriberIdentity {
        SubscriberIdentity::new(self.user_ref, self.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_defaults_to_subscriber_type() {
        let request = SubscribeRequest::new("newsletter").email(" A@X.com ");
        assert_eq!(request.list_type, SUBSCRIBER_LIST_TYPE);
        assert_eq!(request.identity().email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_unsubscribe_by_id() {
        let request = UnsubscribeRequest::by_id(ListId(4)).user(UserRef(2));
        assert_eq!(request.list_id, Some(ListId(4)));
        assert!(request.list_handle.is_empty());
        assert_eq!(request.identity().user_ref, Some(UserRef(2)));
    }

    #[test]
    fn test_query_type_is_optional() {
        assert_eq!(SubscriptionQuery::new("news").list_type, None);
        let query = SubscriptionQuery::new("news").list_type("wishlist");
        assert_eq!(query.list_type.as_deref(), Some("wishlist"));
    }

    #[test]
    fn test_blank_email_is_no_identity() {
        let query = SubscriptionQuery::new("newsletter").email("   ");
        assert!(query.identity().is_empty());
    }
}
