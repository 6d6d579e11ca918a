//! Flattening of per-grouping memberships into a set of group ids.

use std::collections::BTreeSet;
use std::str::FromStr;

use super::error::GroupError;
use super::models::UserGroupings;

/// How group ids from several groupings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MembershipFlattening {
    /// Every grouping contributes its group ids.
    #[default]
    Union,
    /// Only the last grouping in host order counts.
    ///
    /// Each grouping replaces the ids collected from the previous one, as
    /// older Quickmail releases did.
    LastGroupingOnly,
}

impl MembershipFlattening {
    /// Setting value for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::LastGroupingOnly => "last",
        }
    }
}

impl FromStr for MembershipFlattening {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "union" => Ok(Self::Union),
            "last" => Ok(Self::LastGroupingOnly),
            _ => Err(GroupError::InvalidSetting {
                name: "group_flattening",
                value: s.to_string(),
            }),
        }
    }
}

/// Collect the unique group ids of `groupings` under `mode`.
pub fn collect_group_ids(groupings: &UserGroupings, mode: MembershipFlattening) -> BTreeSet<i64> {
    match mode {
        MembershipFlattening::Union => groupings
            .iter()
            .flat_map(|g| g.group_ids.iter().copied())
            .collect(),
        MembershipFlattening::LastGroupingOnly => groupings
            .last()
            .map(|g| g.group_ids.iter().copied().collect())
            .unwrap_or_default(),
    }
}
