//! Group selection and its host collaborators.
//!
//! The selector itself is host-agnostic:
//! - Context resolution, capability checks and group lookups are traits
//! - FERPA strictness is a trait with a settings-driven default
//! - Two hosts ship with the crate: in-memory and `PostgreSQL`

pub mod error;
pub mod ferpa;
pub mod membership;
pub mod memory;
pub mod models;
pub mod ports;
pub mod queries;
pub mod selector;

pub use error::GroupError;
pub use ferpa::{FerpaMode, FerpaPolicy};
pub use membership::{collect_group_ids, MembershipFlattening};
pub use memory::MemoryHost;
pub use models::*;
pub use ports::{ContextResolver, GroupStore, PermissionChecker, StrictnessPolicy};
pub use queries::PgGroupStore;
pub use selector::{GroupSelector, VIEW_GROUP_USERS};
