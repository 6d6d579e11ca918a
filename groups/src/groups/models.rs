//! Course, group and grouping models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Grouping id under which a host reports every group the user belongs to.
pub const ALL_GROUPS_GROUPING: i64 = 0;

/// Groups keyed by group id, ascending.
///
/// A `None` value marks an id the store could not resolve (e.g. a group
/// deleted between the membership read and the record read).
pub type GroupMap = BTreeMap<i64, Option<Group>>;

/// A user's group ids per grouping, in host order.
pub type UserGroupings = Vec<GroupingMembership>;

/// Course group mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Groups are not used.
    #[default]
    NoGroups,
    /// Members only see their own groups.
    SeparateGroups,
    /// Members see all groups but work in their own.
    VisibleGroups,
}

impl GroupMode {
    /// Database representation.
    #[must_use]
    pub const fn as_db(self) -> i16 {
        match self {
            Self::NoGroups => 0,
            Self::SeparateGroups => 1,
            Self::VisibleGroups => 2,
        }
    }
}

// Unknown modes fall back to "no groups", as the host treats them
impl From<i16> for GroupMode {
    fn from(value: i16) -> Self {
        match value {
            1 => Self::SeparateGroups,
            2 => Self::VisibleGroups,
            _ => Self::NoGroups,
        }
    }
}

/// Course record.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Course {
    pub id: i64,
    pub short_name: String,
    pub full_name: String,
    #[sqlx(try_from = "i16")]
    pub group_mode: GroupMode,
}

/// User reference. Only the id is needed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
}

/// Authorization context of a course.
///
/// Opaque to the selector; only handed back to the permission checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct CourseContext {
    pub id: i64,
    pub course_id: i64,
}

/// Group record.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Group {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Group ids of one grouping the user is a member through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupingMembership {
    pub grouping_id: i64,
    pub group_ids: Vec<i64>,
}

impl GroupingMembership {
    pub fn new(grouping_id: i64, group_ids: impl Into<Vec<i64>>) -> Self {
        Self {
            grouping_id,
            group_ids: group_ids.into(),
        }
    }
}
