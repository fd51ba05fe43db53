//! Subscribers and the identities they are resolved by.

mod model;
mod repository;

pub use model::{
    Subscriber, SubscriberDraft, SubscriberId, SubscriberIdentity, UserRef, normalize_email,
};
pub use repository::SubscriberRepository;
