//! `PostgreSQL` host.
//!
//! Provides async query functions for:
//! - Courses and their authorization contexts
//! - Capability checks over role assignments
//! - Groups, groupings and memberships
//!
//! [`PgGroupStore`] exposes them through the collaborator traits.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::error::GroupError;
use super::models::{
    Course, CourseContext, Group, GroupingMembership, UserGroupings, ALL_GROUPS_GROUPING,
};
use super::ports::{ContextResolver, GroupStore, PermissionChecker};

/// Context level of a course.
pub const CONTEXT_COURSE: i16 = 50;

/// Role capability permission values.
pub const CAP_ALLOW: i32 = 1;
pub const CAP_PREVENT: i32 = -1;
pub const CAP_PROHIBIT: i32 = -1000;

// ============================================================================
// Course Queries
// ============================================================================

/// Get a course by ID.
#[tracing::instrument(skip(pool))]
pub async fn get_course(pool: &PgPool, course_id: i64) -> sqlx::Result<Option<Course>> {
    sqlx::query_as::<_, Course>(
        r"
        SELECT id, short_name, full_name, group_mode
        FROM courses
        WHERE id = $1
        ",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

/// Get the authorization context of a course.
#[tracing::instrument(skip(pool))]
pub async fn get_course_context(
    pool: &PgPool,
    course_id: i64,
) -> sqlx::Result<Option<CourseContext>> {
    sqlx::query_as::<_, CourseContext>(
        r"
        SELECT id, instance_id AS course_id
        FROM contexts
        WHERE context_level = $1 AND instance_id = $2
        ",
    )
    .bind(CONTEXT_COURSE)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

// ============================================================================
// Capability Queries
// ============================================================================

/// Check whether a user holds a capability in a course context.
///
/// Role assignments and role capabilities are read from the course context
/// and the system context. Each assigned role takes its permission from the
/// most specific context that defines one, so a course-level prevent beats a
/// system-level allow. The capability is held when any role resolves to a
/// positive permission and no role prohibits it in either context.
#[tracing::instrument(skip(pool))]
pub async fn user_has_capability(
    pool: &PgPool,
    user_id: i64,
    context_id: i64,
    capability: &str,
) -> sqlx::Result<bool> {
    let (allowed, prohibited): (bool, bool) = sqlx::query_as(
        r"
        WITH perms AS (
            SELECT rc.role_id, rc.permission, c.context_level
            FROM role_assignments ra
            INNER JOIN role_capabilities rc ON rc.role_id = ra.role_id
            INNER JOIN contexts c ON c.id = rc.context_id
            INNER JOIN contexts sys ON sys.context_level = 10
            WHERE ra.user_id = $1
              AND ra.context_id IN ($2, sys.id)
              AND rc.context_id IN ($2, sys.id)
              AND rc.capability = $3
        ),
        resolved AS (
            SELECT DISTINCT ON (role_id) role_id, permission
            FROM perms
            ORDER BY role_id, context_level DESC
        )
        SELECT
            COALESCE((SELECT bool_or(permission > 0) FROM resolved), false) AS allowed,
            COALESCE((SELECT bool_or(permission = $4) FROM perms), false) AS prohibited
        ",
    )
    .bind(user_id)
    .bind(context_id)
    .bind(capability)
    .bind(CAP_PROHIBIT)
    .fetch_one(pool)
    .await?;

    Ok(allowed && !prohibited)
}

// ============================================================================
// Group Queries
// ============================================================================

/// Get a group by ID.
#[tracing::instrument(skip(pool))]
pub async fn get_group(pool: &PgPool, group_id: i64) -> sqlx::Result<Option<Group>> {
    sqlx::query_as::<_, Group>(
        r"
        SELECT id, course_id, name, description, created_at
        FROM course_groups
        WHERE id = $1
        ",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await
}

/// Get all groups of a course, ordered by ID.
#[tracing::instrument(skip(pool))]
pub async fn get_course_groups(pool: &PgPool, course_id: i64) -> sqlx::Result<Vec<Group>> {
    sqlx::query_as::<_, Group>(
        r"
        SELECT id, course_id, name, description, created_at
        FROM course_groups
        WHERE course_id = $1
        ORDER BY id ASC
        ",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

/// Get the groups a user belongs to in a course, per grouping.
#[tracing::instrument(skip(pool))]
pub async fn get_user_groupings(
    pool: &PgPool,
    course_id: i64,
    user_id: i64,
) -> sqlx::Result<UserGroupings> {
    let rows: Vec<(i64, Option<i64>)> = sqlx::query_as(
        r"
        SELECT g.id, gg.grouping_id
        FROM course_groups g
        INNER JOIN group_members gm ON gm.group_id = g.id
        LEFT JOIN grouping_groups gg ON gg.group_id = g.id
        WHERE g.course_id = $1 AND gm.user_id = $2
        ORDER BY gg.grouping_id ASC NULLS FIRST, g.id ASC
        ",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(assemble_user_groupings(rows))
}

/// Build the per-grouping view from `(group_id, grouping_id)` rows.
///
/// Real groupings come first in ascending id order, followed by the
/// [`ALL_GROUPS_GROUPING`] entry listing every group.
fn assemble_user_groupings(rows: Vec<(i64, Option<i64>)>) -> UserGroupings {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut all = BTreeSet::new();
    let mut by_grouping: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (group_id, grouping_id) in rows {
        all.insert(group_id);
        if let Some(grouping_id) = grouping_id {
            by_grouping.entry(grouping_id).or_default().insert(group_id);
        }
    }

    by_grouping
        .into_iter()
        .map(|(id, groups)| GroupingMembership::new(id, groups.into_iter().collect::<Vec<_>>()))
        .chain(std::iter::once(GroupingMembership::new(
            ALL_GROUPS_GROUPING,
            all.into_iter().collect::<Vec<_>>(),
        )))
        .collect()
}

// ============================================================================
// Collaborator implementation
// ============================================================================

/// Host collaborators backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, GroupError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), GroupError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Group schema is up to date");
        Ok(())
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Option<Course>, GroupError> {
        Ok(get_course(&self.pool, course_id).await?)
    }
}

#[async_trait]
impl ContextResolver for PgGroupStore {
    async fn course_context(&self, course_id: i64) -> Result<CourseContext, GroupError> {
        get_course_context(&self.pool, course_id)
            .await?
            .ok_or(GroupError::CourseNotFound(course_id))
    }
}

#[async_trait]
impl PermissionChecker for PgGroupStore {
    async fn has_capability(
        &self,
        user_id: i64,
        context: &CourseContext,
        capability: &str,
    ) -> Result<bool, GroupError> {
        Ok(user_has_capability(&self.pool, user_id, context.id, capability).await?)
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn get_user_groupings(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<UserGroupings, GroupError> {
        Ok(get_user_groupings(&self.pool, course_id, user_id).await?)
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, GroupError> {
        Ok(get_group(&self.pool, group_id).await?)
    }

    async fn get_course_groups(&self, course_id: i64) -> Result<Vec<Group>, GroupError> {
        Ok(get_course_groups(&self.pool, course_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result = PgGroupStore::connect("not a database url").await;
        assert!(matches!(result, Err(GroupError::Database(_))));
    }

    #[test]
    fn test_assemble_empty_rows() {
        assert!(assemble_user_groupings(Vec::new()).is_empty());
    }

    #[test]
    fn test_assemble_groups_without_groupings() {
        let groupings = assemble_user_groupings(vec![(4, None), (2, None)]);
        assert_eq!(
            groupings,
            vec![GroupingMembership::new(ALL_GROUPS_GROUPING, [2, 4])]
        );
    }

    #[test]
    fn test_assemble_group_in_several_groupings() {
        let groupings = assemble_user_groupings(vec![
            (1, Some(7)),
            (2, Some(7)),
            (2, Some(8)),
            (3, Some(8)),
            (5, None),
        ]);

        assert_eq!(
            groupings,
            vec![
                GroupingMembership::new(7, [1, 2]),
                GroupingMembership::new(8, [2, 3]),
                GroupingMembership::new(ALL_GROUPS_GROUPING, [1, 2, 3, 5]),
            ]
        );
    }

    mod postgres_tests {
        use super::super::*;
        use crate::groups::models::GroupMode;
        use crate::groups::selector::VIEW_GROUP_USERS;

        async fn seed_course(pool: &PgPool) -> (i64, i64) {
            let (course_id,): (i64,) = sqlx::query_as(
                "INSERT INTO courses (short_name, full_name, group_mode) VALUES ('C', 'Course', 1) RETURNING id",
            )
            .fetch_one(pool)
            .await
            .expect("Failed to insert course");

            let (context_id,): (i64,) = sqlx::query_as(
                "INSERT INTO contexts (context_level, instance_id) VALUES (50, $1) RETURNING id",
            )
            .bind(course_id)
            .fetch_one(pool)
            .await
            .expect("Failed to insert context");

            (course_id, context_id)
        }

        async fn seed_group(pool: &PgPool, course_id: i64, name: &str) -> i64 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO course_groups (course_id, name) VALUES ($1, $2) RETURNING id",
            )
            .bind(course_id)
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("Failed to insert group");
            id
        }

        #[sqlx::test]
        #[ignore] // Requires PostgreSQL
        async fn test_course_and_context_lookup(pool: PgPool) {
            let (course_id, context_id) = seed_course(&pool).await;
            let store = PgGroupStore::new(pool);

            let course = store.get_course(course_id).await.unwrap().unwrap();
            assert_eq!(course.group_mode, GroupMode::SeparateGroups);

            let ctx = store.course_context(course_id).await.unwrap();
            assert_eq!(ctx.id, context_id);
            assert_eq!(ctx.course_id, course_id);

            assert!(matches!(
                store.course_context(course_id + 1000).await,
                Err(GroupError::CourseNotFound(_))
            ));
        }

        #[sqlx::test]
        #[ignore] // Requires PostgreSQL
        async fn test_user_groupings(pool: PgPool) {
            let (course_id, _) = seed_course(&pool).await;
            let a = seed_group(&pool, course_id, "A").await;
            let b = seed_group(&pool, course_id, "B").await;
            let c = seed_group(&pool, course_id, "C").await;

            let (grouping,): (i64,) = sqlx::query_as(
                "INSERT INTO groupings (course_id, name) VALUES ($1, 'G') RETURNING id",
            )
            .bind(course_id)
            .fetch_one(&pool)
            .await
            .unwrap();

            for group_id in [a, b] {
                sqlx::query("INSERT INTO grouping_groups (grouping_id, group_id) VALUES ($1, $2)")
                    .bind(grouping)
                    .bind(group_id)
                    .execute(&pool)
                    .await
                    .unwrap();
            }
            for group_id in [b, c] {
                sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, 5)")
                    .bind(group_id)
                    .execute(&pool)
                    .await
                    .unwrap();
            }

            let store = PgGroupStore::new(pool);
            let groupings = store.get_user_groupings(course_id, 5).await.unwrap();

            assert_eq!(
                groupings,
                vec![
                    GroupingMembership::new(grouping, [b]),
                    GroupingMembership::new(ALL_GROUPS_GROUPING, [b, c]),
                ]
            );
            assert!(store.get_user_groupings(course_id, 6).await.unwrap().is_empty());

            let all = store.get_course_groups(course_id).await.unwrap();
            assert_eq!(all.iter().map(|g| g.id).collect::<Vec<_>>(), vec![a, b, c]);
            assert!(store.get_group(c + 1000).await.unwrap().is_none());
        }

        #[sqlx::test]
        #[ignore] // Requires PostgreSQL
        async fn test_capability_allow_and_prohibit(pool: PgPool) {
            let (course_id, context_id) = seed_course(&pool).await;

            sqlx::query("INSERT INTO role_assignments (role_id, context_id, user_id) VALUES (3, $1, 5), (4, $1, 6), (5, $1, 6)")
                .bind(context_id)
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO role_capabilities (role_id, context_id, capability, permission) VALUES (3, $1, $2, 1), (4, $1, $2, 1), (5, $1, $2, -1000)",
            )
            .bind(context_id)
            .bind(VIEW_GROUP_USERS)
            .execute(&pool)
            .await
            .unwrap();

            let store = PgGroupStore::new(pool);
            let ctx = store.course_context(course_id).await.unwrap();

            assert!(store.has_capability(5, &ctx, VIEW_GROUP_USERS).await.unwrap());
            // Prohibit on a second role wins
            assert!(!store.has_capability(6, &ctx, VIEW_GROUP_USERS).await.unwrap());
            // No assignment at all
            assert!(!store.has_capability(7, &ctx, VIEW_GROUP_USERS).await.unwrap());
        }

        #[sqlx::test]
        #[ignore] // Requires PostgreSQL
        async fn test_capability_course_override_wins(pool: PgPool) {
            let (course_id, context_id) = seed_course(&pool).await;
            let system_id: i64 = sqlx::query_scalar("SELECT id FROM contexts WHERE context_level = 10")
                .fetch_one(&pool)
                .await
                .unwrap();

            sqlx::query("INSERT INTO role_assignments (role_id, context_id, user_id) VALUES (6, $1, 8), (7, $1, 9)")
                .bind(context_id)
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO role_capabilities (role_id, context_id, capability, permission) VALUES \
                 (6, $1, $3, $4), (6, $2, $3, $5), (7, $1, $3, $5), (7, $2, $3, $4)",
            )
            .bind(system_id)
            .bind(context_id)
            .bind(VIEW_GROUP_USERS)
            .bind(CAP_ALLOW)
            .bind(CAP_PREVENT)
            .execute(&pool)
            .await
            .unwrap();

            let store = PgGroupStore::new(pool);
            let ctx = store.course_context(course_id).await.unwrap();

            // Allowed site-wide, prevented in the course
            assert!(!store.has_capability(8, &ctx, VIEW_GROUP_USERS).await.unwrap());
            // Prevented site-wide, allowed in the course
            assert!(store.has_capability(9, &ctx, VIEW_GROUP_USERS).await.unwrap());
        }
    }
}
