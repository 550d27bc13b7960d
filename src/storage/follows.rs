use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, FeedFollow, FollowedFeed};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe a user to a feed.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::NotFound`] if either id does not exist
    /// - [`DatabaseError::Conflict`] if the user already follows the feed
    pub async fn follow_feed(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let follow = insert_follow(&mut tx, user_id, feed_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, feed_id = %feed_id, "Created feed follow");
        Ok(follow)
    }

    /// Feeds a user follows, oldest subscription first.
    pub async fn list_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FollowedFeed>, DatabaseError> {
        let follows = sqlx::query_as::<_, FollowedFeed>(
            r#"
                SELECT f.name AS feed_name, f.url AS feed_url, u.name AS owner_name
                FROM feed_follows ff
                JOIN feeds f ON f.id = ff.feed_id
                LEFT JOIN users u ON u.id = f.user_id
                WHERE ff.user_id = ?
                ORDER BY ff.rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    /// Remove a user's subscription to the feed at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] if the user does not follow that URL.
    pub async fn unfollow_feed(&self, user_id: Uuid, url: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id = (SELECT id FROM feeds WHERE url = ?)
            "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Not following {}",
                url
            )));
        }

        tracing::info!(user_id = %user_id, url = %url, "Removed feed follow");
        Ok(())
    }
}

/// Insert a follow row inside an open transaction.
///
/// Both parents are joined into the INSERT itself so the write comes first
/// in the transaction. When nothing is inserted, one of them is missing and
/// the caller gets a precise [`DatabaseError::NotFound`]; uniqueness is left
/// to the constraint.
pub(crate) async fn insert_follow(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    feed_id: Uuid,
) -> Result<FeedFollow, DatabaseError> {
    let now = Utc::now();
    let follow = sqlx::query_as::<_, FeedFollow>(
        r#"
        INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
        SELECT ?, u.id, f.id, ?, ?
        FROM users u, feeds f
        WHERE u.id = ? AND f.id = ?
        RETURNING id, user_id, feed_id, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(now)
    .bind(now)
    .bind(user_id)
    .bind(feed_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| DatabaseError::on_insert(e, || "Already following this feed".to_string()))?;

    match follow {
        Some(follow) => Ok(follow),
        None => Err(missing_parent(conn, user_id, feed_id).await?),
    }
}

/// Name whichever side of a follow does not exist.
async fn missing_parent(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    feed_id: Uuid,
) -> Result<DatabaseError, DatabaseError> {
    let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if !user_exists {
        return Ok(DatabaseError::NotFound(format!("User {} not found", user_id)));
    }
    Ok(DatabaseError::NotFound(format!("Feed {} not found", feed_id)))
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_follow_unknown_user_is_not_found() {
        let db = test_db().await;
        db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("alice", "Blog", "https://example.com/feed.xml")
            .await
            .unwrap();

        let err = db.follow_feed(Uuid::new_v4(), feed.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(ref msg) if msg.contains("User")));
    }

    #[tokio::test]
    async fn test_follow_unknown_feed_is_not_found() {
        let db = test_db().await;
        let alice = db.create_user("alice").await.unwrap();

        let err = db.follow_feed(alice.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(ref msg) if msg.contains("Feed")));
    }

    #[tokio::test]
    async fn test_unfollow_removes_only_that_follow() {
        let db = test_db().await;
        let alice = db.create_user("alice").await.unwrap();
        db.create_feed_and_follow("alice", "One", "https://one.example.com/rss")
            .await
            .unwrap();
        db.create_feed_and_follow("alice", "Two", "https://two.example.com/rss")
            .await
            .unwrap();

        db.unfollow_feed(alice.id, "https://one.example.com/rss")
            .await
            .unwrap();

        let follows = db.list_follows_for_user(alice.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_name, "Two");
        // The feed itself survives
        assert_eq!(db.list_feeds_with_owners().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unfollow_not_following_is_not_found() {
        let db = test_db().await;
        let alice = db.create_user("alice").await.unwrap();

        let err = db
            .unfollow_feed(alice.id, "https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
