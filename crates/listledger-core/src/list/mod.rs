//! Named, typed lists that subscribers can join.

mod model;
mod repository;

pub use model::{List, ListId, SUBSCRIBER_LIST_TYPE};
pub use repository::{ListDraft, ListRepository};
