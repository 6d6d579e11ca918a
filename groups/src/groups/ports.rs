//! Host collaborator traits.
//!
//! Everything the selector knows about the hosting platform goes through
//! these four seams.

use async_trait::async_trait;

use super::error::GroupError;
use super::models::{Course, CourseContext, Group, UserGroupings};

/// Resolves the authorization context of a course.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    async fn course_context(&self, course_id: i64) -> Result<CourseContext, GroupError>;
}

/// Answers capability checks for a user in a context.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has_capability(
        &self,
        user_id: i64,
        context: &CourseContext,
        capability: &str,
    ) -> Result<bool, GroupError>;
}

/// Read access to groups and group memberships.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// The user's group ids per grouping within the course, in host order.
    ///
    /// Returns an empty list when the user belongs to no group.
    async fn get_user_groupings(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<UserGroupings, GroupError>;

    /// A single group record, `None` if it no longer exists.
    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, GroupError>;

    /// Every group of the course.
    async fn get_course_groups(&self, course_id: i64) -> Result<Vec<Group>, GroupError>;
}

/// Decides whether group visibility is restricted in a course.
#[async_trait]
pub trait StrictnessPolicy: Send + Sync {
    async fn is_strict_for_course(&self, course: &Course) -> Result<bool, GroupError>;
}
