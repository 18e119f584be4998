/// User model and database operations
///
/// Users join projects directly via `project_memberships` or indirectly via
/// groups. Ghost users are system/service accounts; they hold memberships
/// like any other row but are excluded from human membership reconciliation.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(255) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL,
///     first_name VARCHAR(255),
///     last_name VARCHAR(255),
///     is_ghost BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE user_encryption_keys (
///     user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
///     public_key TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Optional given name
    pub first_name: Option<String>,

    /// Optional family name
    pub last_name: Option<String>,

    /// True for system/service accounts excluded from membership reconciliation
    pub is_ghost: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Unique login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Optional given name
    pub first_name: Option<String>,

    /// Optional family name
    pub last_name: Option<String>,

    /// Whether this is a system/service account (defaults to false)
    #[serde(default)]
    pub is_ghost: bool,
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken (unique constraint) or the
    /// database connection fails.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, first_name, last_name, is_ghost)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, first_name, last_name, is_ghost,
                      created_at, updated_at
            "#,
        )
        .bind(data.username)
        .bind(data.email)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.is_ghost)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, first_name, last_name, is_ghost,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by username
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, first_name, last_name, is_ghost,
                   created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Provisions or replaces the user's encryption public key
    ///
    /// Idempotent: a second call overwrites the stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the user doesn't exist (foreign key) or the
    /// database connection fails.
    pub async fn set_encryption_key(
        pool: &PgPool,
        user_id: Uuid,
        public_key: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_encryption_keys (user_id, public_key)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET public_key = EXCLUDED.public_key
            "#,
        )
        .bind(user_id)
        .bind(public_key)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Fetches the user's encryption public key, if provisioned
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn encryption_key(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        let key: Option<String> = sqlx::query_scalar(
            "SELECT public_key FROM user_encryption_keys WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(key)
    }

    /// Deletes a user by ID
    ///
    /// Membership rows and the encryption key cascade away with the account.
    ///
    /// # Returns
    ///
    /// True if the user was deleted, false if the user didn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_defaults_to_human() {
        let data: CreateUser = serde_json::from_str(
            r#"{"username": "mira", "email": "mira@example.com", "first_name": null, "last_name": null}"#,
        )
        .unwrap();

        assert!(!data.is_ghost);
        assert_eq!(data.username, "mira");
    }

    // Integration tests for database operations are in tests/reconcile_tests.rs
}
