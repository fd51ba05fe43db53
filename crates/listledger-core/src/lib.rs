//! # listledger-core
//!
//! Core logic for `ListLedger`, a mailing list subscription ledger.
//!
//! This crate provides:
//! - Lists, identified by a type and handle
//! - Subscribers, identified by a host user reference or an email address
//! - Memberships linking the two, with per-list subscriber counts
//! - The subscribe / unsubscribe / membership check workflow
//! - Local storage (`SQLite`)
//! - Presentation helpers for templates

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod db;
mod error;
pub mod list;
pub mod membership;
pub mod present;
pub mod service;
pub mod subscriber;
pub mod users;

pub use config::Settings;
pub use db::Database;
pub use error::{Error, Result};
pub use list::{List, ListDraft, ListId, ListRepository, SUBSCRIBER_LIST_TYPE};
pub use membership::{Membership, MembershipRepository};
pub use present::{ListPicker, PickerOption, list_ids, subscriber_ids, subscription_ids};
pub use service::{SubscribeRequest, SubscriptionQuery, SubscriptionService, UnsubscribeRequest};
pub use subscriber::{
    Subscriber, SubscriberDraft, SubscriberId, SubscriberIdentity, SubscriberRepository, UserRef,
    normalize_email,
};
pub use users::{NoUsers, UserDirectory};
