//! Group Lookup Error Types

/// Failures reported by host collaborators.
///
/// The selector never produces or rewraps these; whatever a collaborator
/// returns reaches the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("Course not found: {0}")]
    CourseNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invalid value for setting {name}: {value:?}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("Host error: {0}")]
    Host(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
