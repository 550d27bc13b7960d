use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of gator appears to be using the database. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A unique constraint rejected the write
    #[error("{0}")]
    Conflict(String),

    /// A referenced row does not exist
    #[error("{0}")]
    NotFound(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // Check for SQLite lock-related error messages
        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN is a bad path, not a lock, and stays `Other`.
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    /// Classify a failed insert. Unique violations become [`DatabaseError::Conflict`]
    /// with the message produced by `conflict`.
    ///
    /// The storage engine is the only arbiter of uniqueness, so two racing
    /// writers resolve to exactly one success and one conflict.
    pub(crate) fn on_insert(err: sqlx::Error, conflict: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::Conflict(conflict())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DatabaseError::NotFound("referenced user or feed does not exist".to_string())
            }
            _ => DatabaseError::from_sqlx(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered user. `name` is globally unique and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered RSS source. `url` is globally unique; `user_id` is the owner.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's subscription to a feed, independent of ownership.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `list_feeds_with_owners`.
///
/// `owner_name` comes from a LEFT JOIN and is `None` only if the owner row is
/// gone, which the cascade rules should never allow.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FeedWithOwner {
    pub feed_name: String,
    pub feed_url: String,
    pub owner_name: Option<String>,
}

/// Row of `list_follows_for_user`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FollowedFeed {
    pub feed_name: String,
    pub feed_url: String,
    pub owner_name: Option<String>,
}
