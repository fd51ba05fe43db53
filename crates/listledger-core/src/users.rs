//! Lookups against the host application's user accounts.

use std::collections::HashMap;

use crate::subscriber::UserRef;

/// Read-only source of user email addresses.
///
/// Used to fill in a new subscriber's email when it is created from a
/// user reference alone.
pub trait UserDirectory: Send + Sync {
    /// Email address of the given user, if known.
    fn email_for(&self, user: UserRef) -> Option<String>;
}

/// A directory that knows no users.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUsers;

impl UserDirectory for NoUsers {
    fn email_for(&self, _user: UserRef) -> Option<String> {
        None
    }
}

impl UserDirectory for HashMap<UserRef, String> {
    fn email_for(&self, user: UserRef) -> Option<String> {
        self.get(&user).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_directory() {
        let users = HashMap::from([(UserRef(1), "one@example.com".to_string())]);
        assert_eq!(users.email_for(UserRef(1)).as_deref(), Some("one@example.com"));
        assert_eq!(users.email_for(UserRef(2)), None);
        assert_eq!(NoUsers.email_for(UserRef(1)), None);
    }
}
