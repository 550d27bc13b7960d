use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Conflict`] if `name` is already taken. The
    /// check is the `users.name` UNIQUE constraint itself, so concurrent
    /// registrations of the same name cannot both succeed.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_insert(e, || format!("User \"{}\" already exists", name)))?;

        tracing::info!(user = %user.name, id = %user.id, "Created user");
        Ok(user)
    }

    /// Look up a user by exact (case-sensitive) name.
    pub async fn get_user(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// All user names in insertion order.
    pub async fn list_user_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names = sqlx::query_scalar("SELECT name FROM users ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Remove every user. Feeds and follows go with them via `ON DELETE CASCADE`.
    ///
    /// Irreversible. Returns the number of users removed.
    pub async fn delete_all_users(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        tracing::warn!(removed = result.rows_affected(), "Deleted all users");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = test_db().await;

        let created = db.create_user("alice").await.unwrap();
        assert_eq!(created.name, "alice");
        assert_eq!(created.created_at, created.updated_at);

        let fetched = db.get_user("alice").await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_missing_user_is_none() {
        let db = test_db().await;
        assert!(db.get_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_names_are_case_sensitive() {
        let db = test_db().await;

        db.create_user("alice").await.unwrap();
        db.create_user("Alice").await.unwrap();

        assert!(db.get_user("ALICE").await.unwrap().is_none());
        assert_eq!(db.list_user_names().await.unwrap(), vec!["alice", "Alice"]);
    }

    #[tokio::test]
    async fn test_list_user_names_insertion_order() {
        let db = test_db().await;
        assert!(db.list_user_names().await.unwrap().is_empty());

        for name in ["zoe", "adam", "mia"] {
            db.create_user(name).await.unwrap();
        }

        assert_eq!(db.list_user_names().await.unwrap(), vec!["zoe", "adam", "mia"]);
    }

    #[tokio::test]
    async fn test_delete_all_users_on_empty_db() {
        let db = test_db().await;
        assert_eq!(db.delete_all_users().await.unwrap(), 0);
    }
}
