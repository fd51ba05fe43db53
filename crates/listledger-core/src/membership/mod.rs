//! The join table recording which subscribers belong to which lists.

mod model;
mod repository;

pub use model::Membership;
pub use repository::MembershipRepository;
