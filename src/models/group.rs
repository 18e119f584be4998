/// Group model and database operations
///
/// Groups collect users at the organization level; granting a group to a
/// project (see `project_membership`) gives every accepted member access.
/// The group's `role`/`role_id` is the default project role applied when
/// members join via the group.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE groups (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(255) NOT NULL,
///     role VARCHAR(64) NOT NULL,
///     role_id UUID,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, slug)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Org-level user group
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    /// Unique group ID
    pub id: Uuid,

    /// Owning organization
    pub org_id: Uuid,

    /// Display name
    pub name: String,

    /// URL-safe identifier, unique within the organization
    pub slug: String,

    /// Default role applied when members join a project via this group
    pub role: String,

    /// Custom role reference, if the default role is a custom one
    pub role_id: Option<Uuid>,

    /// When the group was created
    pub created_at: DateTime<Utc>,

    /// When the group was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    /// Owning organization
    pub org_id: Uuid,

    /// Display name
    pub name: String,

    /// URL-safe identifier, unique within the organization
    pub slug: String,

    /// Default project role for members joining via this group
    pub role: String,

    /// Custom role reference
    pub role_id: Option<Uuid>,
}

impl Group {
    /// Creates a new group
    ///
    /// # Errors
    ///
    /// Returns an error if the slug is taken within the organization (unique
    /// constraint) or the database connection fails.
    pub async fn create(pool: &PgPool, data: CreateGroup) -> Result<Self, sqlx::Error> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (org_id, name, slug, role, role_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, org_id, name, slug, role, role_id, created_at, updated_at
            "#,
        )
        .bind(data.org_id)
        .bind(data.name)
        .bind(data.slug)
        .bind(data.role)
        .bind(data.role_id)
        .fetch_one(pool)
        .await?;

        Ok(group)
    }

    /// Finds a group by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, org_id, name, slug, role, role_id, created_at, updated_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(group)
    }

    /// Deletes a group by ID
    ///
    /// Member rows and project grants cascade away with the group.
    ///
    /// # Returns
    ///
    /// True if the group was deleted, false if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
