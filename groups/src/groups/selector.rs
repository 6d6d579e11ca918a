//! Group selector.
//!
//! Computes the groups a user may pick as message recipients in a course.
//!
//! Resolution order:
//! 1. Users holding `block/quickmail:viewgroupusers` see every course group
//! 2. Without it, a strict (FERPA) course limits them to their own groups
//! 3. Otherwise every course group is selectable

use std::sync::Arc;

use tracing::debug;

use super::error::GroupError;
use super::membership::{collect_group_ids, MembershipFlattening};
use super::models::{Course, CourseContext, GroupMap, User};
use super::ports::{ContextResolver, GroupStore, PermissionChecker, StrictnessPolicy};

/// Capability that grants visibility of every group in a course.
pub const VIEW_GROUP_USERS: &str = "block/quickmail:viewgroupusers";

/// Resolves selectable and member groups through injected host collaborators.
#[derive(Clone)]
pub struct GroupSelector {
    contexts: Arc<dyn ContextResolver>,
    permissions: Arc<dyn PermissionChecker>,
    store: Arc<dyn GroupStore>,
    strictness: Arc<dyn StrictnessPolicy>,
    flattening: MembershipFlattening,
}

impl GroupSelector {
    pub fn new(
        contexts: Arc<dyn ContextResolver>,
        permissions: Arc<dyn PermissionChecker>,
        store: Arc<dyn GroupStore>,
        strictness: Arc<dyn StrictnessPolicy>,
    ) -> Self {
        Self {
            contexts,
            permissions,
            store,
            strictness,
            flattening: MembershipFlattening::default(),
        }
    }

    /// Build a selector over a host that provides contexts, capabilities and groups.
    pub fn from_host<H>(host: Arc<H>, strictness: Arc<dyn StrictnessPolicy>) -> Self
    where
        H: ContextResolver + PermissionChecker + GroupStore + 'static,
    {
        Self::new(host.clone(), host.clone(), host, strictness)
    }

    /// Set how memberships from several groupings are combined.
    #[must_use]
    pub fn with_flattening(mut self, flattening: MembershipFlattening) -> Self {
        self.flattening = flattening;
        self
    }

    #[must_use]
    pub const fn flattening(&self) -> MembershipFlattening {
        self.flattening
    }

    /// Groups the user is allowed to select for messaging in the course.
    ///
    /// The context is resolved from `course.id` when not supplied.
    #[tracing::instrument(skip_all, fields(course_id = course.id, user_id = user.id))]
    pub async fn get_course_user_selectable_groups(
        &self,
        course: &Course,
        user: &User,
        context: Option<&CourseContext>,
    ) -> Result<GroupMap, GroupError> {
        let context = match context {
            Some(ctx) => *ctx,
            None => self.contexts.course_context(course.id).await?,
        };

        let restricted = !self.user_can_access_all_groups(user, &context).await?
            && self.strictness.is_strict_for_course(course).await?;

        let groups = if restricted {
            self.resolve_memberships(course.id, user.id).await?
        } else {
            self.store
                .get_course_groups(course.id)
                .await?
                .into_iter()
                .map(|group| (group.id, Some(group)))
                .collect()
        };

        debug!(restricted, count = groups.len(), "Resolved selectable groups");
        Ok(groups)
    }

    /// Groups the user belongs to in the course.
    ///
    /// `_context` is accepted so both operations share a signature.
    #[tracing::instrument(skip_all, fields(course_id = course.id, user_id = user.id))]
    pub async fn get_course_user_groups(
        &self,
        course: &Course,
        user: &User,
        _context: Option<&CourseContext>,
    ) -> Result<GroupMap, GroupError> {
        let groups = self.resolve_memberships(course.id, user.id).await?;

        debug!(count = groups.len(), "Resolved member groups");
        Ok(groups)
    }

    async fn user_can_access_all_groups(
        &self,
        user: &User,
        context: &CourseContext,
    ) -> Result<bool, GroupError> {
        self.permissions
            .has_capability(user.id, context, VIEW_GROUP_USERS)
            .await
    }

    async fn resolve_memberships(&self, course_id: i64, user_id: i64) -> Result<GroupMap, GroupError> {
        let groupings = self.store.get_user_groupings(course_id, user_id).await?;
        if groupings.is_empty() {
            return Ok(GroupMap::new());
        }

        let mut groups = GroupMap::new();
        for group_id in collect_group_ids(&groupings, self.flattening) {
            let group = self.store.get_group(group_id).await?;
            if group.is_none() {
                debug!(group_id, "Group referenced by membership not found");
            }
            groups.insert(group_id, group);
        }

        Ok(groups)
    }
}
