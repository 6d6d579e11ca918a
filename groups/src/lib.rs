//! Quickmail Groups
//!
//! Resolves which course groups a user may select as message recipients,
//! and which groups a user belongs to, under the block's FERPA policy.

pub mod config;
pub mod groups;

pub use groups::{GroupError, GroupSelector};
