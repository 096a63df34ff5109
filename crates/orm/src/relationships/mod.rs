//! Relationships Module - declared table links and join planning

pub mod metadata;
pub mod resolver;

pub use metadata::Relationship;
pub use resolver::{find_relationship_between, plan_joins};
