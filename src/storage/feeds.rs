use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedFollow, FeedWithOwner};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `owner_name`.
    ///
    /// Owner lookup and insert run in one transaction.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::NotFound`] if no user is named `owner_name`
    /// - [`DatabaseError::Conflict`] if any user already registered `url`
    pub async fn create_feed(
        &self,
        owner_name: &str,
        name: &str,
        url: &str,
    ) -> Result<Feed, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let feed = insert_feed(&mut tx, owner_name, name, url).await?;
        tx.commit().await?;

        tracing::info!(feed = %feed.name, url = %feed.url, owner = %owner_name, "Created feed");
        Ok(feed)
    }

    /// Register a feed and subscribe its owner to it, atomically.
    ///
    /// Either both rows are written or neither is.
    pub async fn create_feed_and_follow(
        &self,
        owner_name: &str,
        name: &str,
        url: &str,
    ) -> Result<(Feed, FeedFollow), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let feed = insert_feed(&mut tx, owner_name, name, url).await?;
        let follow = super::follows::insert_follow(&mut tx, feed.user_id, feed.id).await?;
        tx.commit().await?;

        tracing::info!(feed = %feed.name, url = %feed.url, owner = %owner_name, "Created and followed feed");
        Ok((feed, follow))
    }

    /// Look up a feed by its exact URL.
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, name, url, user_id, created_at, updated_at FROM feeds WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Every feed with its owner's name, in insertion order.
    pub async fn list_feeds_with_owners(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
                SELECT f.name AS feed_name, f.url AS feed_url, u.name AS owner_name
                FROM feeds f
                LEFT JOIN users u ON u.id = f.user_id
                ORDER BY f.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}

/// Insert a feed row, resolving the owner inside the same statement.
///
/// The write is the first statement of the caller's transaction, so SQLite
/// takes the write lock up front and concurrent writers queue on the busy
/// timeout instead of failing on a stale read snapshot.
async fn insert_feed(
    conn: &mut SqliteConnection,
    owner_name: &str,
    name: &str,
    url: &str,
) -> Result<Feed, DatabaseError> {
    let now = Utc::now();
    let feed = sqlx::query_as::<_, Feed>(
        r#"
        INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
        SELECT ?, ?, ?, u.id, ?, ?
        FROM users u
        WHERE u.name = ?
        RETURNING id, name, url, user_id, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(url)
    .bind(now)
    .bind(now)
    .bind(owner_name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| DatabaseError::on_insert(e, || format!("Feed {} is already registered", url)))?;

    feed.ok_or_else(|| DatabaseError::NotFound(format!("User \"{}\" not found", owner_name)))
}
