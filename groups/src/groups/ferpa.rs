//! FERPA strictness policy.
//!
//! The block's `ferpa` setting decides whether students may only message
//! their own groups:
//! - `strictferpa`: always restricted
//! - `courseferpa`: restricted when the course uses separate groups
//! - `noferpa`: never restricted

use std::str::FromStr;

use async_trait::async_trait;

use super::error::GroupError;
use super::models::{Course, GroupMode};
use super::ports::StrictnessPolicy;

/// Value of the block's `ferpa` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FerpaMode {
    #[default]
    Strict,
    Course,
    NoFerpa,
}

impl FerpaMode {
    /// Setting value for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strictferpa",
            Self::Course => "courseferpa",
            Self::NoFerpa => "noferpa",
        }
    }
}

impl FromStr for FerpaMode {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strictferpa" => Ok(Self::Strict),
            "courseferpa" => Ok(Self::Course),
            "noferpa" => Ok(Self::NoFerpa),
            _ => Err(GroupError::InvalidSetting {
                name: "ferpa",
                value: s.to_string(),
            }),
        }
    }
}

/// Strictness policy driven by a fixed [`FerpaMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FerpaPolicy {
    mode: FerpaMode,
}

impl FerpaPolicy {
    #[must_use]
    pub const fn new(mode: FerpaMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn mode(&self) -> FerpaMode {
        self.mode
    }

    /// Synchronous form of [`StrictnessPolicy::is_strict_for_course`].
    #[must_use]
    pub fn is_strict(&self, course: &Course) -> bool {
        match self.mode {
            FerpaMode::Strict => true,
            FerpaMode::NoFerpa => false,
            FerpaMode::Course => course.group_mode == GroupMode::SeparateGroups,
        }
    }
}

#[async_trait]
impl StrictnessPolicy for FerpaPolicy {
    async fn is_strict_for_course(&self, course: &Course) -> Result<bool, GroupError> {
        Ok(self.is_strict(course))
    }
}
