//! In-memory host.
//!
//! Holds courses, groups, groupings, memberships and capability grants in
//! plain maps. Populate it with the `add_*` methods, then share it behind an
//! `Arc`; lookups never mutate it.
//!
//! User groupings are reported like the host platform does: real groupings
//! in ascending id order, then [`ALL_GROUPS_GROUPING`] last.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;

use super::error::GroupError;
use super::models::{
    Course, CourseContext, Group, GroupingMembership, UserGroupings, ALL_GROUPS_GROUPING,
};
use super::ports::{ContextResolver, GroupStore, PermissionChecker};

#[derive(Debug, Clone)]
struct Grouping {
    course_id: i64,
    group_ids: BTreeSet<i64>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    courses: HashMap<i64, Course>,
    contexts: HashMap<i64, CourseContext>,
    users: HashSet<i64>,
    groups: BTreeMap<i64, Group>,
    groupings: BTreeMap<i64, Grouping>,
    /// group id -> (course id, member user ids)
    members: BTreeMap<i64, (i64, HashSet<i64>)>,
    /// (context id, user id) -> capabilities
    grants: HashMap<(i64, i64), HashSet<String>>,
    next_context_id: i64,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a course together with its authorization context.
    pub fn add_course(&mut self, course: Course) -> CourseContext {
        self.next_context_id += 1;
        let context = CourseContext {
            id: self.next_context_id,
            course_id: course.id,
        };
        self.contexts.insert(course.id, context);
        self.courses.insert(course.id, course);
        context
    }

    pub fn add_user(&mut self, user_id: i64) {
        self.users.insert(user_id);
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.id, group);
    }

    /// Remove a group record while leaving memberships and groupings
    /// pointing at it, as happens when a group is deleted mid-request.
    pub fn remove_group(&mut self, group_id: i64) -> Option<Group> {
        self.groups.remove(&group_id)
    }

    pub fn add_grouping(&mut self, grouping_id: i64, course_id: i64, group_ids: &[i64]) {
        self.groupings.insert(
            grouping_id,
            Grouping {
                course_id,
                group_ids: group_ids.iter().copied().collect(),
            },
        );
    }

    /// Add a user to an existing group. Unknown groups are ignored.
    pub fn add_member(&mut self, group_id: i64, user_id: i64) {
        let Some(course_id) = self.groups.get(&group_id).map(|g| g.course_id) else {
            return;
        };
        self.users.insert(user_id);
        self.members
            .entry(group_id)
            .or_insert_with(|| (course_id, HashSet::new()))
            .1
            .insert(user_id);
    }

    /// Grant a capability to a user in a course's context.
    pub fn grant_capability(&mut self, course_id: i64, user_id: i64, capability: &str) {
        if let Some(ctx) = self.contexts.get(&course_id) {
            self.grants
                .entry((ctx.id, user_id))
                .or_default()
                .insert(capability.to_string());
        }
    }

    pub fn course(&self, course_id: i64) -> Option<&Course> {
        self.courses.get(&course_id)
    }

    fn require_course(&self, course_id: i64) -> Result<(), GroupError> {
        if self.courses.contains_key(&course_id) {
            Ok(())
        } else {
            Err(GroupError::CourseNotFound(course_id))
        }
    }

    fn require_user(&self, user_id: i64) -> Result<(), GroupError> {
        if self.users.contains(&user_id) {
            Ok(())
        } else {
            Err(GroupError::UserNotFound(user_id))
        }
    }
}

#[async_trait]
impl ContextResolver for MemoryHost {
    async fn course_context(&self, course_id: i64) -> Result<CourseContext, GroupError> {
        self.contexts
            .get(&course_id)
            .copied()
            .ok_or(GroupError::CourseNotFound(course_id))
    }
}

#[async_trait]
impl PermissionChecker for MemoryHost {
    async fn has_capability(
        &self,
        user_id: i64,
        context: &CourseContext,
        capability: &str,
    ) -> Result<bool, GroupError> {
        self.require_user(user_id)?;

        Ok(self
            .grants
            .get(&(context.id, user_id))
            .is_some_and(|caps| caps.contains(capability)))
    }
}

#[async_trait]
impl GroupStore for MemoryHost {
    async fn get_user_groupings(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<UserGroupings, GroupError> {
        self.require_course(course_id)?;
        self.require_user(user_id)?;

        let all: Vec<i64> = self
            .members
            .iter()
            .filter(|(_, (course, users))| *course == course_id && users.contains(&user_id))
            .map(|(group_id, _)| *group_id)
            .collect();

        if all.is_empty() {
            return Ok(Vec::new());
        }

        let mut groupings = Vec::new();
        for (grouping_id, grouping) in &self.groupings {
            if grouping.course_id != course_id {
                continue;
            }
            let ids: Vec<i64> = grouping
                .group_ids
                .iter()
                .copied()
                .filter(|id| all.contains(id))
                .collect();
            if !ids.is_empty() {
                groupings.push(GroupingMembership::new(*grouping_id, ids));
            }
        }
        groupings.push(GroupingMembership::new(ALL_GROUPS_GROUPING, all));

        Ok(groupings)
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, GroupError> {
        Ok(self.groups.get(&group_id).cloned())
    }

    async fn get_course_groups(&self, course_id: i64) -> Result<Vec<Group>, GroupError> {
        self.require_course(course_id)?;

        Ok(self
            .groups
            .values()
            .filter(|g| g.course_id == course_id)
            .cloned()
            .collect())
    }
}
