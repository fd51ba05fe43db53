//! Subscription service.
//!
//! Ties the list, subscriber and membership repositories together and
//! keeps the denormalized subscriber counts in step with memberships.

mod request;
mod subscription;

pub use request::{SubscribeRequest, SubscriptionQuery, UnsubscribeRequest};
pub use subscription::SubscriptionService;
